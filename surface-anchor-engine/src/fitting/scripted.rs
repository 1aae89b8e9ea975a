//! Scripted stand-in for the fitting engine, used by the headless demo and
//! the integration tests. Results are served in the order they were queued;
//! an empty script answers with a miss.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use bevy::math::Vec3;

use crate::fitting::{FindSurfaceEngine, FitError, FitParams, FitResult};

#[derive(Default)]
pub struct ScriptedEngine {
    script: Mutex<VecDeque<FitResult>>,
    invocations: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        ScriptedEngine::default()
    }

    pub fn push(&self, result: FitResult) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(result);
        }
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl FindSurfaceEngine for ScriptedEngine {
    fn perform(
        &self,
        points: &[Vec3],
        seed_index: usize,
        _params: &FitParams,
    ) -> Result<FitResult, FitError> {
        if seed_index >= points.len() {
            return Err(FitError::SeedOutOfRange {
                index: seed_index,
                count: points.len(),
            });
        }
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let result = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or(FitResult::None);
        Ok(result)
    }
}
