//! Desktop notifications through `org.freedesktop.Notifications`.

use std::collections::HashMap;

use glib::{Variant, variant::ToVariant};
use tracing::{debug, error, info, warn};

use arachne_cdl_core::Notifier;

const NOTIFICATIONS_NAME: &str = "org.freedesktop.Notifications";
const NOTIFICATIONS_PATH: &str = "/org/freedesktop/Notifications";
const NOTIFICATIONS_IFACE: &str = "org.freedesktop.Notifications";

const APP_NAME: &str = "Arachne Config Downloader";
const ICON_INFO: &str = "network-vpn";
const ICON_ERROR: &str = "dialog-error";

/// fdo urgency hint values.
const URGENCY_LOW: u8 = 0;
const URGENCY_NORMAL: u8 = 1;

/// Let the server pick the timeout.
const EXPIRE_DEFAULT: i32 = -1;
const DBUS_CALL_TIMEOUT_MS: i32 = 2000;

/// Shows messages as desktop notifications. Every message is logged as
/// well, so nothing is lost when no notification daemon runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }

    fn send(&self, summary: &str, body: &str, icon: &str, urgency: u8) {
        let bus = match gio::bus_get_sync(gio::BusType::Session, None::<&gio::Cancellable>) {
            Ok(bus) => bus,
            Err(e) => {
                debug!("No session bus for notifications: {}", e);
                return;
            }
        };

        let mut hints: HashMap<String, Variant> = HashMap::new();
        hints.insert("urgency".to_string(), urgency.to_variant());

        let args = (
            APP_NAME,
            0u32,
            icon,
            summary,
            body,
            Vec::<String>::new(),
            hints,
            EXPIRE_DEFAULT,
        )
            .to_variant();

        if let Err(e) = bus.call_sync(
            Some(NOTIFICATIONS_NAME),
            NOTIFICATIONS_PATH,
            NOTIFICATIONS_IFACE,
            "Notify",
            Some(&args),
            glib::VariantTy::new("(u)").ok(),
            gio::DBusCallFlags::NONE,
            DBUS_CALL_TIMEOUT_MS,
            None::<&gio::Cancellable>,
        ) {
            warn!("Cannot show notification: {}", e);
        }
    }
}

impl Notifier for DesktopNotifier {
    fn info(&self, message: &str) {
        info!("{}", message);
        self.send("Info", message, ICON_INFO, URGENCY_LOW);
    }

    fn error(&self, message: &str) {
        error!("{}", message);
        self.send("Error", message, ICON_ERROR, URGENCY_NORMAL);
    }
}
