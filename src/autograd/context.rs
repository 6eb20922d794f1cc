//! Execution context for building computational graphs

/// Switches consulted when a function is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    enable_backprop: bool,
    type_check: bool,
}

impl Context {
    /// Create a new context with backprop and type checking on
    pub fn new() -> Self {
        Self {
            enable_backprop: true,
            type_check: true,
        }
    }

    /// Record graph nodes for backward
    pub fn enable_grad(&mut self) {
        self.enable_backprop = true;
    }

    /// Run forward only; outputs carry no creator
    pub fn no_grad(&mut self) {
        self.enable_backprop = false;
    }

    /// Check if graph recording is on
    pub fn is_backprop_enabled(&self) -> bool {
        self.enable_backprop
    }

    /// Turn input type checking on or off
    pub fn set_type_check(&mut self, enabled: bool) {
        self.type_check = enabled;
    }

    /// Check if input type checking is on
    pub fn is_type_check_enabled(&self) -> bool {
        self.type_check
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
