//! HTML email templates
//!
//! Templates are embedded at compile time and rendered with Tera. Every
//! `.html` template is autoescaped, so caller-supplied values can't inject
//! markup.

use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

pub const LOGIN_NOTIFICATION: &str = "login_notification.html";
pub const BRANDED_MESSAGE: &str = "branded_message.html";

/// Slots each template must use, and may not go beyond
const TEMPLATE_SLOTS: &[(&str, &[&str])] = &[
    (
        LOGIN_NOTIFICATION,
        &["name", "timestamp", "ip", "browser", "brand"],
    ),
    (BRANDED_MESSAGE, &["subject", "body", "timestamp", "brand"]),
];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template error: {0}")]
    Tera(#[from] tera::Error),

    #[error("Template {template} does not use slot {slot}")]
    MissingSlot {
        template: &'static str,
        slot: &'static str,
    },
}

/// Values for the login alert
#[derive(Debug, Serialize)]
pub struct LoginNotification<'a> {
    pub name: &'a str,
    pub timestamp: &'a str,
    pub ip: &'a str,
    pub browser: &'a str,
    pub brand: &'a str,
}

/// Values for a free-form message wrapped in the house style
#[derive(Debug, Serialize)]
pub struct BrandedMessage<'a> {
    pub subject: &'a str,
    pub body: &'a str,
    pub timestamp: &'a str,
    pub brand: &'a str,
}

/// Current local time as shown in emails, `DD/MM/YYYY HH:MM:SS`
pub fn submission_timestamp() -> String {
    chrono::Local::now().format("%d/%m/%Y %H:%M:%S").to_string()
}

pub struct Templates {
    tera: Tera,
}

impl Templates {
    /// Register the built-in templates and check their slots
    pub fn load() -> Result<Self, TemplateError> {
        Self::from_sources(&[
            (
                LOGIN_NOTIFICATION,
                include_str!("../templates/login_notification.html"),
            ),
            (
                BRANDED_MESSAGE,
                include_str!("../templates/branded_message.html"),
            ),
        ])
    }

    fn from_sources(sources: &[(&str, &str)]) -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(sources.to_vec())?;

        let templates = Self { tera };
        for &(template, slots) in TEMPLATE_SLOTS {
            templates.validate(template, slots)?;
        }
        Ok(templates)
    }

    /// Render with a marker in every slot
    ///
    /// Tera rejects unknown variables, and each marker must survive into the
    /// output, so the template uses exactly the expected slots.
    fn validate(&self, template: &'static str, slots: &[&'static str]) -> Result<(), TemplateError> {
        let mut context = Context::new();
        for &slot in slots {
            context.insert(slot, &probe_marker(slot));
        }

        let rendered = self.tera.render(template, &context)?;
        for &slot in slots {
            if !rendered.contains(&probe_marker(slot)) {
                return Err(TemplateError::MissingSlot { template, slot });
            }
        }
        Ok(())
    }

    pub fn render_login_notification(
        &self,
        values: &LoginNotification<'_>,
    ) -> Result<String, TemplateError> {
        self.render(LOGIN_NOTIFICATION, values)
    }

    pub fn render_branded_message(
        &self,
        values: &BrandedMessage<'_>,
    ) -> Result<String, TemplateError> {
        self.render(BRANDED_MESSAGE, values)
    }

    fn render<T: Serialize>(&self, template: &str, values: &T) -> Result<String, TemplateError> {
        let context = Context::from_serialize(values)?;
        Ok(self.tera.render(template, &context)?)
    }
}

fn probe_marker(slot: &str) -> String {
    format!("__slot_{}__", slot)
}
