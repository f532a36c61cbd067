//! Built-in `layout-view` component.
//!
//! Hosts a page (one marked "used as widget") as a nested running flow.
//! The scheduler creates the nested flow when this component's owner
//! starts, and on each run forwards the buffered inputs into it instead of
//! executing anything here: `@seqin` activates the nested start components,
//! other inputs are matched by wire id to the nested `input` components.
//! The embedded page is named by the `layout` config property.

use crate::traits::{BehaviorMeta, ComponentBehavior};

pub struct LayoutViewComponent;

impl ComponentBehavior for LayoutViewComponent {
    fn meta(&self) -> BehaviorMeta {
        BehaviorMeta::layout_host("layout-view")
    }
}
