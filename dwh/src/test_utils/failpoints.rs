use fail::FailScenario;

/// Exclusive fail point scenario of one test.
///
/// Scenarios of concurrent tests wait for the running one to be dropped, so fail points
/// armed here never fire in another test. Dropping the scenario turns every armed point
/// off.
pub struct FailpointScenario<'a> {
    armed: Vec<String>,
    _scenario: FailScenario<'a>,
}

impl<'a> FailpointScenario<'a> {
    pub fn start() -> FailpointScenario<'a> {
        Self {
            armed: Vec::new(),
            _scenario: FailScenario::setup(),
        }
    }

    /// Configures `name` with `action`, e.g. `return(connection)`.
    ///
    /// # Panics
    /// Panics if `action` cannot be parsed.
    pub fn arm(&mut self, name: &str, action: &str) {
        fail::cfg(name, action)
            .unwrap_or_else(|err| panic!("invalid action `{action}` for `{name}`: {err}"));
        self.armed.push(name.to_string());
    }

    /// Turns every armed fail point off.
    pub fn disarm(&mut self) {
        for name in self.armed.drain(..) {
            fail::remove(name);
        }
    }
}

impl Drop for FailpointScenario<'_> {
    fn drop(&mut self) {
        self.disarm();
    }
}
