//! The wrapper behind `proxy_refs`.
//!
//! Reads unwrap ref slots. Writing a non-ref into a slot that currently
//! holds a ref writes through the ref instead of replacing it. Everything
//! else forwards to the target unchanged, so a wrapped reactive container
//! keeps its own tracking.

use super::handler::Handler;
use super::Object;
use crate::reactive::unref;
use crate::value::Value;

pub(crate) struct RefUnwrapHandler;

pub(crate) static REF_UNWRAP_HANDLER: RefUnwrapHandler = RefUnwrapHandler;

impl Handler for RefUnwrapHandler {
    fn label(&self) -> &'static str {
        "RefUnwrap"
    }

    fn is_readonly(&self) -> bool {
        false
    }

    fn is_shallow(&self) -> bool {
        true
    }

    fn reactive_flag(&self) -> bool {
        false
    }

    fn exposes_raw(&self) -> bool {
        false
    }

    fn get(&self, _proxy: &Object, target: &Object, key: &Value) -> Value {
        unref(&target.get(key.clone()))
    }

    fn set(&self, _proxy: &Object, target: &Object, key: Value, value: Value) -> bool {
        if !value.is_ref() {
            if let Some(slot) = target.get(key.clone()).as_boxed() {
                slot.set(value);
                return true;
            }
        }
        target.set(key, value)
    }
}
