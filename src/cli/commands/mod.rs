pub mod completions;
pub mod renew;
pub mod resolve;
pub mod status;
pub mod watch;
