//! `xi2-monitor`: print every XI2 event on the root window, plus the device list.
//!
//! Log level follows `RUST_LOG`, eg. `RUST_LOG=xi2_events=trace` to watch the decoder work.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use xi2_events::{
    device::ClassInfo,
    events::{EventData, EventName},
    Builder,
};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut bindings = match Builder::new()
        .version(2, 4)
        .with_class(EventName::RawKeyPress)
        .with_class(EventName::RawKeyRelease)
        .build_x11(None)
    {
        Ok(bindings) => bindings,
        Err(err) => {
            tracing::error!(%err, "couldn't set up XI2");
            return ExitCode::FAILURE;
        }
    };
    let Some(root) = bindings.server().root() else {
        tracing::error!("no root window");
        return ExitCode::FAILURE;
    };

    match bindings.list_devices(true, true) {
        Ok(devices) => {
            for device in devices.values() {
                tracing::info!(
                    id = device.id,
                    name = %device.name,
                    use_ = %device.use_,
                    attachment = device.attachment,
                    enabled = device.enabled,
                    "device"
                );
                for class in device.classes.values() {
                    if let ClassInfo::Valuator {
                        number, label, min, max, ..
                    } = class
                    {
                        let label = label.as_deref().unwrap_or("-");
                        tracing::info!(number, label, min, max, "  valuator");
                    } else {
                        tracing::info!(kind = class.kind(), source = class.source(), "  class");
                    }
                }
            }
        }
        Err(err) => tracing::warn!(%err, "couldn't list devices"),
    }

    // Raw and hierarchy events aren't window-scoped, they come in on window zero.
    let on_root = [
        EventName::KeyPress,
        EventName::KeyRelease,
        EventName::Motion,
        EventName::ButtonPress,
        EventName::ButtonRelease,
        EventName::TouchBegin,
        EventName::TouchUpdate,
        EventName::TouchEnd,
    ]
    .map(|name| (root, name));
    let unscoped = [
        EventName::RawKeyPress,
        EventName::RawKeyRelease,
        EventName::RawButtonPress,
        EventName::RawButtonRelease,
        EventName::RawMotion,
        EventName::RawTouchBegin,
        EventName::RawTouchUpdate,
        EventName::RawTouchEnd,
        EventName::HierarchyChanged,
    ]
    .map(|name| (0, name));
    for (window, name) in on_root.into_iter().chain(unscoped) {
        bindings.connect(window, name, |event, device| {
            let device = device.map_or("?", |d| d.name.as_str());
            match &event.data {
                EventData::Device(e) => tracing::info!(
                    serial = event.serial,
                    %device,
                    detail = e.detail,
                    x = e.x,
                    y = e.y,
                    valuators = ?e.valuators,
                    "{}",
                    event.name
                ),
                EventData::Raw(e) => tracing::info!(
                    serial = event.serial,
                    %device,
                    detail = e.detail,
                    valuators = ?e.raw_valuators,
                    "{}",
                    event.name
                ),
                EventData::Hierarchy { flags } => {
                    tracing::info!(serial = event.serial, ?flags, "{}", event.name);
                }
                EventData::Header => tracing::info!(serial = event.serial, "{}", event.name),
            }
        });
    }

    loop {
        let mut cookie = match bindings.server().wait_cookie() {
            Ok(cookie) => cookie,
            Err(err) => {
                tracing::error!(%err, "connection lost");
                return ExitCode::FAILURE;
            }
        };
        let hotplug = bindings
            .parse_event(&mut cookie)
            .is_some_and(|event| event.name == EventName::HierarchyChanged);
        // Handlers only see the cache, refresh it so events from new devices find their record.
        if hotplug {
            if let Err(err) = bindings.list_devices(true, true) {
                tracing::warn!(%err, "couldn't refresh devices");
            }
        }
    }
}
