use crate::modules::error::MailStashResult;

pub mod executors;

pub trait Initialize {
    async fn initialize() -> MailStashResult<()>;
}

pub trait MailStashTask {
    fn start();
}
