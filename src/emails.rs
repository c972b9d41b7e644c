//! Email templates for lifecycle and purchase notifications.
//!
//! Every template is a pure function from a small data record to a subject and
//! an HTML body. Interpolated values are escaped.

use crate::utils::format_usd;
use chrono::NaiveDate;
use html_escape::{encode_double_quoted_attribute, encode_text};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTemplate {
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone)]
pub struct ListingEmailData<'a> {
    pub name: &'a str,
    pub listing_type: &'a str,
    pub end_date: NaiveDate,
    pub renew_url: &'a str,
}

#[derive(Debug, Clone)]
pub struct AdEmailData<'a> {
    pub title: &'a str,
    pub end_date: NaiveDate,
    pub renew_url: &'a str,
}

#[derive(Debug, Clone)]
pub struct RenewalEmailData<'a> {
    pub name: &'a str,
    pub listing_type: &'a str,
    pub end_date: NaiveDate,
    pub monthly_fee: i64,
}

#[derive(Debug, Clone)]
pub struct PurchaseEmailData<'a> {
    pub product_name: &'a str,
    pub order_id: i64,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total: i64,
    pub download_url: Option<&'a str>,
}

fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn button(label: &str, url: &str) -> String {
    format!(
        r#"<p style="margin: 32px 0;"><a href="{}" style="display: inline-block; background: #2563eb; color: #ffffff; padding: 12px 24px; border-radius: 8px; text-decoration: none; font-weight: 600;">{}</a></p>"#,
        encode_double_quoted_attribute(url),
        encode_text(label)
    )
}

fn layout(heading: &str, body: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{heading}</title>
</head>
<body style="margin: 0; padding: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif; background-color: #f4f4f5; color: #18181b;">
    <table role="presentation" style="width: 100%; border-collapse: collapse;">
        <tr>
            <td style="padding: 40px 20px;">
                <table role="presentation" style="max-width: 600px; margin: 0 auto; background: #ffffff; border-radius: 12px; border: 1px solid #e4e4e7;">
                    <tr>
                        <td style="padding: 32px 40px 8px;">
                            <h1 style="margin: 0; font-size: 24px; line-height: 1.3;">{heading}</h1>
                        </td>
                    </tr>
                    <tr>
                        <td style="padding: 16px 40px 40px; font-size: 16px; line-height: 1.6; color: #3f3f46;">
                            {body}
                        </td>
                    </tr>
                </table>
            </td>
        </tr>
    </table>
</body>
</html>"##,
        heading = encode_text(heading),
        body = body
    )
}

fn listing_expiring(data: &ListingEmailData<'_>, days: u32) -> EmailTemplate {
    let name = encode_text(data.name);
    let body = format!(
        "<p>Your {} listing <strong>{}</strong> expires in {} days, on {}.</p>\
         <p>Renew now to keep your placement. After expiry the listing stays visible for a \
         7-day grace period and is then moved to a free listing.</p>{}",
        encode_text(data.listing_type),
        name,
        days,
        format_date(data.end_date),
        button("Renew listing", data.renew_url),
    );
    EmailTemplate {
        subject: format!("Your listing \"{}\" expires in {} days", data.name, days),
        html: layout("Your listing is expiring soon", &body),
    }
}

pub fn listing_seven_day_warning(data: &ListingEmailData<'_>) -> EmailTemplate {
    listing_expiring(data, 7)
}

pub fn listing_three_day_warning(data: &ListingEmailData<'_>) -> EmailTemplate {
    listing_expiring(data, 3)
}

pub fn listing_grace_period_started(data: &ListingEmailData<'_>) -> EmailTemplate {
    let body = format!(
        "<p>Your {} listing <strong>{}</strong> expired on {}.</p>\
         <p>It will keep its current placement for a 7-day grace period. If it is not renewed \
         by then, it will be downgraded to a free listing.</p>{}",
        encode_text(data.listing_type),
        encode_text(data.name),
        format_date(data.end_date),
        button("Renew listing", data.renew_url),
    );
    EmailTemplate {
        subject: format!("Your listing \"{}\" has expired - grace period started", data.name),
        html: layout("Grace period started", &body),
    }
}

pub fn listing_downgraded(data: &ListingEmailData<'_>) -> EmailTemplate {
    let body = format!(
        "<p>The grace period for <strong>{}</strong> has ended and the listing is now a free \
         listing. It remains in the directory, without sponsored placement.</p>\
         <p>You can upgrade again at any time.</p>{}",
        encode_text(data.name),
        button("Upgrade listing", data.renew_url),
    );
    EmailTemplate {
        subject: format!("Your listing \"{}\" has been moved to a free listing", data.name),
        html: layout("Listing downgraded", &body),
    }
}

fn ad_expiring(data: &AdEmailData<'_>, days: u32) -> EmailTemplate {
    let body = format!(
        "<p>Your ad <strong>{}</strong> stops running in {} days, on {}.</p>\
         <p>Extend the campaign to keep it live.</p>{}",
        encode_text(data.title),
        days,
        format_date(data.end_date),
        button("Extend campaign", data.renew_url),
    );
    EmailTemplate {
        subject: format!("Your ad \"{}\" ends in {} days", data.title, days),
        html: layout("Your ad campaign is ending", &body),
    }
}

pub fn ad_fourteen_day_warning(data: &AdEmailData<'_>) -> EmailTemplate {
    ad_expiring(data, 14)
}

pub fn ad_seven_day_warning(data: &AdEmailData<'_>) -> EmailTemplate {
    ad_expiring(data, 7)
}

pub fn listing_renewed(data: &RenewalEmailData<'_>) -> EmailTemplate {
    let body = format!(
        "<p>Thanks for renewing <strong>{}</strong>.</p>\
         <p>Plan: {} ({} / month)<br>Active until: {}</p>",
        encode_text(data.name),
        encode_text(data.listing_type),
        format_usd(data.monthly_fee),
        format_date(data.end_date),
    );
    EmailTemplate {
        subject: format!("Your listing \"{}\" has been renewed", data.name),
        html: layout("Listing renewed", &body),
    }
}

pub fn purchase_confirmation(data: &PurchaseEmailData<'_>) -> EmailTemplate {
    let discount_line = if data.discount_amount > 0 {
        format!("Discount: -{}<br>", format_usd(data.discount_amount))
    } else {
        String::new()
    };
    let download = data
        .download_url
        .map(|url| button("Download", url))
        .unwrap_or_default();
    let body = format!(
        "<p>Thank you for purchasing <strong>{}</strong>.</p>\
         <p>Order #{}<br>Subtotal: {}<br>{}Total: {}</p>{}",
        encode_text(data.product_name),
        data.order_id,
        format_usd(data.subtotal),
        discount_line,
        format_usd(data.total),
        download,
    );
    EmailTemplate {
        subject: format!("Your purchase: {}", data.product_name),
        html: layout("Thanks for your purchase", &body),
    }
}
