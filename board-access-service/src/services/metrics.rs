use metrics::counter;

pub fn record_sign_up() {
    counter!("board_access_sign_ups_total").increment(1);
}

/// `outcome` is `success` or `invalid_credential`.
pub fn record_sign_in(outcome: &'static str) {
    counter!("board_access_sign_ins_total", "outcome" => outcome).increment(1);
}

pub fn record_invitation_accepted() {
    counter!("board_access_invitations_accepted_total").increment(1);
}

pub fn record_access_decision(decision: &'static str) {
    counter!("board_access_decisions_total", "decision" => decision).increment(1);
}
