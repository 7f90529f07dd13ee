pub mod collections;
pub mod computation;
pub mod introspection;
pub mod io;

use crate::error::ExceptionKind;
use crate::types::{Builtin, BuiltinFn, State, Value};

/// Register all builtin functions and exception classes into the state.
pub fn register_builtins(state: &mut State) {
    let reg = |state: &mut State, name: &'static str, func: BuiltinFn| {
        state.builtins.insert(name, Value::Builtin(Builtin { name, func }));
    };

    // Output and conversion to text
    reg(state, "print", io::print);
    reg(state, "repr", io::builtin_repr);
    reg(state, "str", io::builtin_str);

    // Numbers
    reg(state, "abs", computation::abs);
    reg(state, "int", computation::int);
    reg(state, "float", computation::float);
    reg(state, "bool", computation::bool);
    reg(state, "divmod", computation::divmod);
    reg(state, "min", computation::min);
    reg(state, "max", computation::max);
    reg(state, "sum", computation::sum);

    // Sequences and mappings
    reg(state, "len", collections::len);
    reg(state, "list", collections::list);
    reg(state, "tuple", collections::tuple);
    reg(state, "dict", collections::dict);
    reg(state, "range", collections::range);
    reg(state, "sorted", collections::sorted);
    reg(state, "enumerate", collections::enumerate);
    reg(state, "zip", collections::zip);

    // Introspection
    reg(state, "isinstance", introspection::isinstance);
    reg(state, "callable", introspection::callable);
    reg(state, "dir", introspection::dir);
    reg(state, "getattr", introspection::getattr);
    reg(state, "hasattr", introspection::hasattr);
    reg(state, "setattr", introspection::setattr);

    for kind in ExceptionKind::ALL {
        state.builtins.insert(kind.name(), Value::ExceptionType(kind));
    }
}
