//! Factory resolution for a rendered config
//!
//! The nested collector gets the emitter from the plugin receiver and every
//! other factory from the host. Each distinct component type is looked up
//! once, however many instances of it the rendered config declares.

use crate::emitter::EmitterFactory;
use crate::error::{PluginError, PluginResult};
use crate::rendered::RenderedConfig;
use otelcol_core::{Factories, Host, Kind};
use std::sync::Arc;
use tracing::debug;

/// Collect the factories needed to run `rendered`
pub fn resolve_factories(
    host: &dyn Host,
    rendered: &RenderedConfig,
    emitter: Arc<EmitterFactory>,
) -> PluginResult<Factories> {
    let mut factories = Factories::new().with_exporter(emitter);

    for kind in Kind::ALL {
        for id in rendered.component_ids(kind)? {
            let component_type = id.component_type();
            if factories.contains(kind, component_type) {
                continue;
            }

            let factory = host
                .get_factory(kind, component_type)
                .filter(|factory| factory.kind() == kind)
                .ok_or_else(|| PluginError::MissingFactory {
                    kind,
                    component_type: component_type.to_string(),
                })?;
            debug!(kind = %kind, component_type = %component_type, "Resolved factory from host");
            factories.register(factory);
        }
    }

    Ok(factories)
}
