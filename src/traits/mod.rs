mod driver;
mod native;

pub use driver::{Capabilities, DriverDefinition, DriverProfile};
pub use native::{
    BoundLiteral, ColumnStream, Connector, NativeConnection, NativeStatement, NativeTarget,
    PrepareOptions, ResultAccessor, StatementIntrospection,
};
