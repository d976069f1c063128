use ejsvm_derive::Mark;

use crate::gc::{Slot, VarId};

/// Activation record of a running function. Every slot here is a root.
#[derive(Debug, Clone, Default, Mark)]
pub struct CallFrame {
    pub function: Slot,
    pub this_obj: Slot,
    /// Arguments, locals and temporaries
    pub locals: Vec<Slot>,
    pub return_value: Slot,
}

impl CallFrame {
    pub fn new(function: Slot, this_obj: Slot, num_locals: usize) -> Self {
        Self {
            function,
            this_obj,
            locals: vec![None; num_locals],
            return_value: None,
        }
    }
}

/// Module initializer that has not run yet
#[derive(Debug, Clone, Copy, Mark)]
pub struct ModuleInit {
    pub function: VarId,
    #[mark(skip)]
    pub initialized: bool,
}
