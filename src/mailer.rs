//! Order confirmation e-mails over SMTP.

use chrono::FixedOffset;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};
use thiserror::Error;

use crate::{
    config::EmailConfig,
    models::{Order, OrderItem},
    shop_time::format_shop_time,
};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("smtp credentials are not configured")]
    NotConfigured,

    #[error("invalid address: {0}")]
    Address(String),

    #[error("failed to build email: {0}")]
    Build(String),

    #[error("smtp error: {0}")]
    Smtp(String),
}

#[derive(Clone)]
pub struct Mailer {
    config: EmailConfig,
}

impl Mailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.username.is_some()
            && self.config.password.is_some()
            && self.recipient().is_some()
    }

    fn recipient(&self) -> Option<&str> {
        self.config
            .notify_to
            .as_deref()
            .or(self.config.from.as_deref())
    }

    pub async fn send_order_confirmation(
        &self,
        order: &Order,
        items: &[OrderItem],
        offset: FixedOffset,
    ) -> Result<(), MailError> {
        let (Some(username), Some(password), Some(to)) = (
            self.config.username.clone(),
            self.config.password.clone(),
            self.recipient(),
        ) else {
            return Err(MailError::NotConfigured);
        };
        let from = self.config.from.clone().unwrap_or_else(|| username.clone());

        let email = Message::builder()
            .from(
                from.parse()
                    .map_err(|e| MailError::Address(format!("{from}: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| MailError::Address(format!("{to}: {e}")))?)
            .subject(order_subject(order))
            .header(ContentType::TEXT_HTML)
            .body(render_order_html(order, items, offset))
            .map_err(|e| MailError::Build(e.to_string()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
            .map_err(|e| MailError::Smtp(e.to_string()))?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(username, password))
            .build();

        transport
            .send(email)
            .await
            .map_err(|e| MailError::Smtp(e.to_string()))?;
        Ok(())
    }
}

pub fn order_subject(order: &Order) -> String {
    format!("Новый заказ #{}", order.order_number)
}

pub fn render_order_html(order: &Order, items: &[OrderItem], offset: FixedOffset) -> String {
    let optional = |label: &str, value: &Option<String>| {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(|v| format!("<p><strong>{label}:</strong> {}</p>", escape_html(v)))
            .unwrap_or_default()
    };

    let rows: String = items
        .iter()
        .map(|item| {
            let line_total = item.product_price * i64::from(item.quantity);
            format!(
                "<tr><td>{}</td><td>{}</td><td>{} ₽</td><td>{} ₽</td></tr>",
                escape_html(&item.product_name),
                item.quantity,
                format_rubles(item.product_price),
                format_rubles(line_total),
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>{subject}</title></head>
<body style="font-family: Arial, sans-serif; color: #333;">
<h2>Новый заказ #{number}</h2>
<p><strong>Дата:</strong> {created}</p>
<h3>Покупатель</h3>
<p><strong>Имя:</strong> {name}</p>
<p><strong>Телефон:</strong> {phone}</p>
{email}{address}{delivery}{comment}
<h3>Товары</h3>
<table border="1" cellpadding="6" cellspacing="0" style="border-collapse: collapse;">
<tr><th>Товар</th><th>Кол-во</th><th>Цена</th><th>Сумма</th></tr>
{rows}
</table>
<p><strong>Итого: {total} ₽</strong></p>
</body>
</html>"#,
        subject = escape_html(&order_subject(order)),
        number = escape_html(&order.order_number),
        created = format_shop_time(order.created_at, offset, "%d.%m.%Y %H:%M"),
        name = escape_html(&order.customer_name),
        phone = escape_html(&order.customer_phone),
        email = optional("Email", &order.customer_email),
        address = optional("Адрес", &order.customer_address),
        delivery = optional("Доставка", &order.delivery_method),
        comment = optional("Комментарий", &order.comment),
        rows = rows,
        total = format_rubles(order.total_amount),
    )
}

/// Prices are kept in kopecks.
pub fn format_rubles(kopecks: i64) -> String {
    let sign = if kopecks < 0 { "-" } else { "" };
    let abs = kopecks.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn sample_order() -> (Order, Vec<OrderItem>) {
        let created = Utc.with_ymd_and_hms(2026, 5, 10, 9, 15, 0).unwrap();
        let order_id = Uuid::new_v4();
        let order = Order {
            id: order_id,
            user_id: None,
            order_number: "ORD-20260510-1A2B3C4D".into(),
            customer_name: "Анна <script>".into(),
            customer_phone: "+7 900 000-00-00".into(),
            customer_email: Some("anna@example.com".into()),
            customer_address: None,
            delivery_method: Some("Самовывоз".into()),
            comment: Some("  ".into()),
            status: "В сборке".into(),
            total_amount: 250050,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: created,
            updated_at: created,
        };
        let items = vec![OrderItem {
            id: Uuid::new_v4(),
            order_id,
            product_id: Uuid::new_v4(),
            product_name: "Платье".into(),
            product_price: 125025,
            quantity: 2,
            created_at: created,
        }];
        (order, items)
    }

    #[test]
    fn body_lists_contacts_and_lines() {
        let (order, items) = sample_order();
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let html = render_order_html(&order, &items, offset);

        assert!(html.contains("Новый заказ #ORD-20260510-1A2B3C4D"));
        assert!(html.contains("Анна &lt;script&gt;"));
        assert!(html.contains("Самовывоз"));
        assert!(!html.contains("Адрес"));
        assert!(!html.contains("Комментарий"));
        assert!(html.contains("<td>Платье</td><td>2</td><td>1250.25 ₽</td><td>2500.50 ₽</td>"));
        assert!(html.contains("Итого: 2500.50 ₽"));
        assert!(html.contains("10.05.2026 12:15"));
    }

    #[test]
    fn subject_carries_order_number() {
        let (order, _) = sample_order();
        assert_eq!(order_subject(&order), "Новый заказ #ORD-20260510-1A2B3C4D");
    }

    #[test]
    fn rubles_are_formatted_from_kopecks() {
        assert_eq!(format_rubles(0), "0.00");
        assert_eq!(format_rubles(99), "0.99");
        assert_eq!(format_rubles(150000), "1500.00");
    }

    #[test]
    fn disabled_without_credentials() {
        let mailer = Mailer::new(EmailConfig {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            username: None,
            password: None,
            from: None,
            notify_to: Some("ops@example.com".into()),
        });
        assert!(!mailer.is_enabled());
    }
}
