//! Template rendering: placeholder substitution and query-backed components.
//!
//! A template is the body of a `[TypeName]` definition. Rendering an instance
//! runs in a fixed order:
//!
//! 1. `{data.<field>}` and `{content}` are substituted
//! 2. self-closing component tags are parsed from the substituted text
//! 3. each component is planned, queried and formatted
//! 4. component spans are replaced back to front
//!
//! Only reads are issued to the store.

pub mod components;
pub mod parser;
pub mod renderer;

pub use components::{Layout, Plan, Resolution, error_marker, order_fields, resolve};
pub use parser::{
    ComponentKind, ComponentTag, Segment, parse_components, segments, substitute_placeholders,
    value_to_text,
};
pub use renderer::{Renderer, placeholder_data};
