//! Lexical scopes. An `Environment` is a handle to one frame of a chain
//! `[global, block₁, block₂, …]`; frames point back at their parents, so
//! a closure that clones its handle keeps the exact chain that was live
//! where the function was defined. Parents never own children.

use crate::runtime::value::{CallContext, CallResult, Function, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

struct Frame {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Frame>>,
}

impl Frame {
    fn new(parent: Option<Rc<Frame>>) -> Rc<Self> {
        Rc::new(Frame {
            vars: RefCell::new(HashMap::new()),
            parent,
        })
    }
}

#[derive(Clone)]
pub struct Environment {
    frame: Rc<Frame>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// A fresh environment consisting of just the global frame.
    pub fn new() -> Self {
        Self {
            frame: Frame::new(None),
        }
    }

    /// Pushes a child frame. The child borrows the parent chain by
    /// back-reference; the parent is not modified.
    pub fn enter_block(&self) -> Environment {
        Environment {
            frame: Frame::new(Some(self.frame.clone())),
        }
    }

    /// Reads a name, searching innermost to outermost. Missing names read
    /// as nil.
    pub fn get(&self, name: &str) -> Value {
        let mut frame = Some(&self.frame);
        while let Some(current) = frame {
            if let Some(value) = current.vars.borrow().get(name) {
                return value.clone();
            }
            frame = current.parent.as_ref();
        }
        Value::nil()
    }

    /// Writes a name where it is already bound, falling through to the
    /// global frame when it is bound nowhere.
    pub fn set(&self, name: &str, value: Value) {
        let mut frame = &self.frame;
        loop {
            if frame.vars.borrow().contains_key(name) {
                frame.vars.borrow_mut().insert(name.to_string(), value);
                return;
            }
            match frame.parent.as_ref() {
                Some(parent) => frame = parent,
                None => {
                    frame.vars.borrow_mut().insert(name.to_string(), value);
                    return;
                }
            }
        }
    }

    /// Writes the innermost frame unconditionally.
    pub fn set_local(&self, name: &str, value: Value) {
        self.frame
            .vars
            .borrow_mut()
            .insert(name.to_string(), value);
    }

    /// Writes the global frame directly.
    pub fn set_global(&self, name: &str, value: Value) {
        let mut frame = &self.frame;
        while let Some(parent) = frame.parent.as_ref() {
            frame = parent;
        }
        frame.vars.borrow_mut().insert(name.to_string(), value);
    }

    /// Installs a host value under a global name.
    pub fn add(&self, name: &str, value: Value) {
        self.set_global(name, value);
    }

    /// Installs a native function under a global name.
    pub fn add_native(
        &self,
        name: &str,
        func: impl Fn(CallContext<'_>) -> crate::runtime::error::RuntimeResult<CallResult> + 'static,
    ) {
        self.set_global(name, Value::from(Function::native(name, func)));
    }

    fn depth(&self) -> usize {
        let mut depth = 1;
        let mut frame = &self.frame;
        while let Some(parent) = frame.parent.as_ref() {
            depth += 1;
            frame = parent;
        }
        depth
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Environment({} frames, {} innermost bindings)",
            self.depth(),
            self.frame.vars.borrow().len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_names_read_nil() {
        let env = Environment::new();
        assert_eq!(env.get("missing"), Value::nil());
    }

    #[test]
    fn set_falls_through_to_global() {
        let global = Environment::new();
        let block = global.enter_block();
        block.set("x", Value::number(1.0));
        assert_eq!(global.get("x"), Value::number(1.0));
    }

    #[test]
    fn set_updates_the_binding_frame() {
        let global = Environment::new();
        global.set_local("x", Value::number(1.0));
        let block = global.enter_block();
        block.set_local("x", Value::number(2.0));
        block.set("x", Value::number(3.0));
        assert_eq!(block.get("x"), Value::number(3.0));
        assert_eq!(global.get("x"), Value::number(1.0));
    }

    #[test]
    fn locals_shadow_and_stay_in_their_block() {
        let global = Environment::new();
        global.set_local("x", Value::number(1.0));
        {
            let block = global.enter_block();
            block.set_local("x", Value::number(2.0));
            assert_eq!(block.get("x"), Value::number(2.0));
        }
        assert_eq!(global.get("x"), Value::number(1.0));
    }

    #[test]
    fn captured_chains_stay_alive() {
        let captured;
        {
            let global = Environment::new();
            let block = global.enter_block();
            block.set_local("x", Value::number(42.0));
            captured = block.clone();
        }
        assert_eq!(captured.get("x"), Value::number(42.0));
    }
}
