pub mod api;
pub mod clock;
pub mod launcher;
pub mod orchestrator;
pub mod poller;
pub mod presigned;
pub mod router;
pub mod validator;
