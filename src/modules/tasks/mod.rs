use crate::modules::context::MailStashTask;
use crate::modules::sync::tick::SyncSchedulerTask;

pub mod queue;

pub struct PeriodicTasks;

impl PeriodicTasks {
    pub fn start_background_tasks() {
        SyncSchedulerTask::start();
    }
}
