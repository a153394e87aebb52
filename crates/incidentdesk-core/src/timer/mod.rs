/// Forward [`TimedTask`] on a handle type to its shared `inner` state.
macro_rules! delegate_timed_task {
    ($handle:ty) => {
        impl $crate::timer::TimedTask for $handle {
            fn tick(&self, elapsed: ::std::time::Duration) {
                $crate::timer::TimedTask::tick(&*self.inner, elapsed);
            }

            fn pause(&self) {
                $crate::timer::TimedTask::pause(&*self.inner);
            }

            fn unpause(&self) {
                $crate::timer::TimedTask::unpause(&*self.inner);
            }

            fn stop(&self) {
                $crate::timer::TimedTask::stop(&*self.inner);
            }

            fn is_paused(&self) -> bool {
                $crate::timer::TimedTask::is_paused(&*self.inner)
            }

            fn is_stopped(&self) -> bool {
                $crate::timer::TimedTask::is_stopped(&*self.inner)
            }
        }
    };
}

mod countdown;
mod progress;
mod scheduler;
mod task;

pub use countdown::Countdown;
pub use progress::{required_work_ms, ProgressBar};
pub use scheduler::{Scheduler, DEFAULT_TICK};
pub use task::{Decay, TaskState, TimedTask};
