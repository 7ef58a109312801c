// Per-operation generation table: `(minimum level, handler)` rungs.
//
// Running a ladder executes exactly one handler, the one with the highest
// minimum level not above the negotiated level. When no rung applies the
// operation is not supported by this server.

use tracing::debug;

use tfvc_common::{ServiceLevel, VcError};

type Handler<'a, T> = Box<dyn FnOnce() -> Result<T, VcError> + 'a>;

pub(crate) struct Ladder<'a, T> {
    operation: &'static str,
    rungs: Vec<(ServiceLevel, Handler<'a, T>)>,
}

impl<'a, T> Ladder<'a, T> {
    pub(crate) fn new(operation: &'static str) -> Self {
        Self {
            operation,
            rungs: Vec::with_capacity(4),
        }
    }

    pub(crate) fn rung(
        mut self,
        min_level: ServiceLevel,
        handler: impl FnOnce() -> Result<T, VcError> + 'a,
    ) -> Self {
        self.rungs.push((min_level, Box::new(handler)));
        self
    }

    /// The level of the rung `run` would pick.
    pub(crate) fn select(&self, level: ServiceLevel) -> Option<ServiceLevel> {
        self.rungs
            .iter()
            .map(|(min, _)| *min)
            .filter(|min| *min <= level)
            .max()
    }

    pub(crate) fn run(self, level: ServiceLevel) -> Result<T, VcError> {
        let lowest = self
            .rungs
            .iter()
            .map(|(min, _)| *min)
            .min()
            .unwrap_or(ServiceLevel::PreTfs2010);
        let chosen = self
            .rungs
            .into_iter()
            .filter(|(min, _)| *min <= level)
            .max_by_key(|(min, _)| *min);

        match chosen {
            Some((min, handler)) => {
                debug!(operation = self.operation, generation = %min, "dispatching");
                handler()
            }
            None => Err(VcError::not_supported(
                format!("{} is not supported by this server", self.operation),
                lowest,
                level,
            )),
        }
    }
}
