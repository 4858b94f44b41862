mod contact;
mod content;
mod cron;
mod revalidate;
mod webhooks;

pub use contact::submit_contact;
pub use content::{get_content, list_content};
pub use cron::{cron_get, cron_post};
pub use revalidate::revalidate;
pub use webhooks::{webhook_health, webhook_receive};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
