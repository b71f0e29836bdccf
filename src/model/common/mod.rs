pub mod code;
pub mod election;
pub mod password;
pub mod status;
pub mod tally;
