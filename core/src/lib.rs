pub mod ansi;
pub mod config;
pub mod error;
pub mod exclusions;
pub mod invoker;
pub mod locations;
pub mod manager;
pub mod poller;
pub mod signal;
pub mod state;
pub mod status;

pub use error::{EngineError, Result};
pub use manager::{Action, VpnManager};

/// Interfaces that platform shells implement so the core stays free of
/// platform-specific dependencies.
pub mod platform {
    use crate::error::InvocationError;

    /// Trait for platform-correct config/data paths.
    pub trait AppPaths {
        fn config_path(&self) -> std::path::PathBuf;
        fn data_dir(&self) -> std::path::PathBuf;
    }

    /// Trait for running the VPN client with arguments and collecting its
    /// combined output. Implementations must be callable from any thread.
    pub trait CommandRunner: Send + Sync {
        fn run(&self, args: &[&str]) -> Result<String, InvocationError>;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use crate::error::InvocationError;
    use crate::platform::CommandRunner;

    /// Canned replies keyed by the space-joined argument line. Each queued
    /// reply is used once; the last one sticks. Unscripted commands fail.
    #[derive(Default)]
    pub struct ScriptedRunner {
        replies: Mutex<HashMap<String, VecDeque<Result<String, (i32, String)>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ok(self, args: &str, output: &str) -> Self {
            self.push(args, Ok(output.to_string()));
            self
        }

        pub fn fail(self, args: &str, code: i32, output: &str) -> Self {
            self.push(args, Err((code, output.to_string())));
            self
        }

        pub fn push(&self, args: &str, reply: Result<String, (i32, String)>) {
            self.replies
                .lock()
                .unwrap()
                .entry(args.to_string())
                .or_default()
                .push_back(reply);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, args: &str) -> usize {
            self.calls().iter().filter(|c| *c == args).count()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, args: &[&str]) -> Result<String, InvocationError> {
            let key = args.join(" ");
            self.calls.lock().unwrap().push(key.clone());

            let reply = {
                let mut replies = self.replies.lock().unwrap();
                match replies.get_mut(&key) {
                    Some(queue) if queue.len() > 1 => queue.pop_front(),
                    Some(queue) => queue.front().cloned(),
                    None => None,
                }
            };

            match reply {
                Some(Ok(output)) => Ok(output),
                Some(Err((code, output))) => Err(InvocationError::Failed {
                    program: "scripted".to_string(),
                    code: Some(code),
                    output,
                }),
                None => Err(InvocationError::Failed {
                    program: "scripted".to_string(),
                    code: Some(127),
                    output: format!("unscripted command: {key}"),
                }),
            }
        }
    }
}
