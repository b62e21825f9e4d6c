//! In-memory configurable request used by the engine unit tests.

use std::sync::{Arc, Mutex};

use opcall_registry::{BuilderSignature, CallError, ConfigurableRequest, Returns, TypedValue};

pub(crate) type CallLog = Arc<Mutex<Vec<(String, Vec<TypedValue>)>>>;

/// Records every builder call and returns a canned execute result.
pub(crate) struct RecordingRequest {
    builders: Vec<BuilderSignature>,
    calls: CallLog,
    returns: Returns,
}

impl RecordingRequest {
    pub(crate) fn new(builders: Vec<BuilderSignature>, returns: Returns) -> (Box<Self>, CallLog) {
        let calls = CallLog::default();
        let request = Box::new(Self {
            builders,
            calls: Arc::clone(&calls),
            returns,
        });
        (request, calls)
    }
}

impl ConfigurableRequest for RecordingRequest {
    fn builder(&self, name: &str) -> Option<&BuilderSignature> {
        self.builders.iter().find(|signature| signature.name == name)
    }

    fn configure(self: Box<Self>, method: &str, arguments: Vec<TypedValue>) -> Result<Box<dyn ConfigurableRequest>, CallError> {
        self.calls.lock().expect("call log lock").push((method.to_string(), arguments));
        Ok(self)
    }

    fn execute(self: Box<Self>) -> Returns {
        self.returns
    }
}

pub(crate) fn recorded(calls: &CallLog) -> Vec<(String, Vec<TypedValue>)> {
    calls.lock().expect("call log lock").clone()
}
