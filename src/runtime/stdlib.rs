//! The native function seed installed into every fresh environment.
//! Hosts extend or replace these through `Interpreter::environment()`.

use crate::runtime::environment::Environment;
use crate::runtime::error::RuntimeError;
use crate::runtime::origin::Origin;
use crate::runtime::value::{CallResult, Function, Vallist, Value};

pub fn register(env: &Environment) {
    env.add_native("print", |ctx| {
        let rendered: Vec<String> = ctx.args.iter().map(|v| v.to_string()).collect();
        println!("{}", rendered.join("\t"));
        Ok(CallResult::default())
    });

    env.add_native("type", |ctx| {
        let value = ctx.args.get(0);
        Ok(CallResult::from(vec![Value::from(value.type_name())]))
    });

    // Converted values are host-produced: their origin is known but not
    // forceable.
    env.add_native("tostring", |ctx| {
        let value = ctx.args.get(0);
        let result = Value::from(value.to_string()).with_origin(Origin::External);
        Ok(CallResult::from(vec![result]))
    });

    env.add_native("tonumber", |ctx| {
        let value = ctx.args.get(0);
        let result = match value.coerce_number() {
            Some(number) => Value::number(number).with_origin(Origin::External),
            None => Value::nil(),
        };
        Ok(CallResult::from(vec![result]))
    });

    env.add_native("assert", |ctx| {
        let value = ctx.args.get(0);
        if !value.truthy() {
            let message = match ctx.args.get(1).as_str() {
                Some(text) => text.to_string(),
                None => "assertion failed!".to_string(),
            };
            return Err(RuntimeError::runtime(message, ctx.call_location));
        }
        Ok(CallResult::new(ctx.args.clone()))
    });

    env.add_native("ipairs", |ctx| {
        let table = ctx.args.get(0);
        if table.as_table().is_none() {
            return Err(RuntimeError::TypeError {
                op: "iterate".to_string(),
                operands: table.type_name().to_string(),
                range: ctx.call_location,
            });
        }
        let iterator = Function::native("ipairs_iterator", |ctx| {
            let table = ctx.args.get(0);
            let control = ctx.args.get(1).as_number().unwrap_or(0.0);
            let Some(table) = table.as_table() else {
                return Ok(CallResult::default());
            };
            let key = Value::number(control + 1.0);
            let value = table.get(&key);
            if value.is_nil() {
                return Ok(CallResult::from(vec![Value::nil()]));
            }
            Ok(CallResult::from(vec![key, value]))
        });
        Ok(CallResult::new(Vallist::from(vec![
            Value::from(iterator),
            table,
            Value::number(0.0),
        ])))
    });

    // Surfaces origin forcing to scripts: returns the target value and
    // proposes the change that would make the program produce it.
    env.add_native("force", |ctx| {
        let value = ctx.args.get(0);
        let target = ctx.args.get(1);
        let change = value.force(&target);
        Ok(CallResult::with_change(
            Vallist::from(vec![target]),
            change,
        ))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::value::Table;

    #[test]
    fn type_names() {
        let env = Environment::new();
        register(&env);
        assert!(env.get("type").as_function().is_some());
        assert!(env.get("print").as_function().is_some());
        assert!(env.get("force").as_function().is_some());
    }

    #[test]
    fn tonumber_coerces_strings() {
        let value = Value::from(" 42 ");
        assert_eq!(value.coerce_number(), Some(42.0));
        assert_eq!(Value::from(Table::new()).coerce_number(), None);
    }
}
