//! UI Builder module for creating keyboards and formatting messages

use rust_decimal::Decimal;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::html;
use uuid::Uuid;

use crate::cart::CartView;
use crate::localization::{t_args_lang, t_lang};
use crate::order_lifecycle::OrderStatus;
use crate::shop_model::{Category, Order, ProductWithTiers};

use super::callback_data::CallbackAction;

pub const CURRENCIES_PER_PAGE: usize = 30;
pub const CURRENCY_BUTTONS_PER_ROW: usize = 5;

/// Fiat-style price with two decimals
pub fn format_price(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// Crypto amount without trailing zeros
pub fn format_amount(amount: Decimal) -> String {
    amount.normalize().to_string()
}

fn button(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.into(), action.to_string())
}

fn main_menu_row(language_code: Option<&str>) -> Vec<InlineKeyboardButton> {
    vec![button(
        t_lang("btn-main-menu", language_code),
        CallbackAction::MainMenu,
    )]
}

pub fn main_menu_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button(t_lang("btn-browse", language_code), CallbackAction::Browse)],
        vec![
            button(t_lang("btn-cart", language_code), CallbackAction::ViewCart),
            button(t_lang("btn-orders", language_code), CallbackAction::OrderHistory),
        ],
    ])
}

pub fn back_to_menu_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![main_menu_row(language_code)])
}

/// One button per category, then `back`
pub fn category_keyboard(
    categories: &[Category],
    back: CallbackAction,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
        .iter()
        .map(|c| vec![button(c.name.clone(), CallbackAction::OpenCategory(c.id))])
        .collect();
    rows.push(vec![button(t_lang("btn-back", language_code), back)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn back_keyboard(back: CallbackAction, language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button(t_lang("btn-back", language_code), back)]])
}

/// Where "back" leads from a category
pub fn parent_action(category: &Category) -> CallbackAction {
    match category.parent_id {
        Some(parent) => CallbackAction::OpenCategory(parent),
        None => CallbackAction::Browse,
    }
}

/// Caption and one "add" button per price tier
pub fn product_card(
    item: &ProductWithTiers,
    price_currency: &str,
    language_code: Option<&str>,
) -> (String, InlineKeyboardMarkup) {
    let product = &item.product;
    let currency = price_currency.to_uppercase();

    let mut caption = format!("<b>{}</b>", html::escape(&product.name));
    if let Some(description) = product.description.as_deref().filter(|d| !d.is_empty()) {
        caption.push_str(&format!("\n{}", html::escape(description)));
    }
    if let Some(video) = product.video_url.as_deref().filter(|v| !v.is_empty()) {
        caption.push_str(&format!("\n🎬 {}", html::escape(video)));
    }
    let unit = html::escape(&product.unit);
    for tier in &item.price_tiers {
        caption.push_str(&format!(
            "\n• {}",
            t_args_lang(
                "product-tier-line",
                &[
                    ("label", &html::escape(&tier.label)),
                    ("price", &format_price(tier.price)),
                    ("currency", &currency),
                    ("unit", &unit),
                ],
                language_code,
            )
        ));
    }

    let rows = item
        .price_tiers
        .iter()
        .map(|tier| {
            vec![button(
                t_args_lang(
                    "btn-add-tier",
                    &[("label", &tier.label), ("price", &format_price(tier.price))],
                    language_code,
                ),
                CallbackAction::AddToCart(tier.id),
            )]
        })
        .collect::<Vec<_>>();

    (caption, InlineKeyboardMarkup::new(rows))
}

/// Cart text and keyboard: one remove button per line, then clear/checkout
pub fn cart_message(
    view: &CartView,
    price_currency: &str,
    language_code: Option<&str>,
) -> (String, InlineKeyboardMarkup) {
    let CartView::Lines {
        cart_id,
        lines,
        total,
    } = view
    else {
        return (
            t_lang("cart-empty", language_code),
            InlineKeyboardMarkup::new(vec![
                vec![button(t_lang("btn-browse", language_code), CallbackAction::Browse)],
                main_menu_row(language_code),
            ]),
        );
    };

    let currency = price_currency.to_uppercase();
    let mut text = t_lang("cart-title", language_code);
    for line in lines {
        text.push_str(&format!(
            "\n{} = {} {}",
            html::escape(&line.describe()),
            format_price(line.line_total()),
            currency
        ));
    }
    text.push_str("\n\n");
    text.push_str(&t_args_lang(
        "cart-total",
        &[("total", &format_price(*total)), ("currency", &currency)],
        language_code,
    ));

    let mut rows: Vec<Vec<InlineKeyboardButton>> = lines
        .iter()
        .map(|line| {
            vec![button(
                t_args_lang(
                    "btn-remove-item",
                    &[("item", &format!("{} ({})", line.product_name, line.tier_label))],
                    language_code,
                ),
                CallbackAction::RemoveItem(line.item_id),
            )]
        })
        .collect();
    rows.push(vec![
        button(
            t_lang("btn-clear-cart", language_code),
            CallbackAction::ClearCart(*cart_id),
        ),
        button(
            t_lang("btn-checkout", language_code),
            CallbackAction::Checkout(*cart_id),
        ),
    ]);
    rows.push(main_menu_row(language_code));

    (text, InlineKeyboardMarkup::new(rows))
}

/// Number of currency pages, at least 1
pub fn currency_page_count(total: usize) -> usize {
    total.div_ceil(CURRENCIES_PER_PAGE).max(1)
}

/// Keyboard for one page of currencies. Out-of-range pages are clamped to
/// the last page; the page actually shown is returned.
pub fn currency_keyboard(
    cart_id: Uuid,
    currencies: &[String],
    page: usize,
    language_code: Option<&str>,
) -> (usize, InlineKeyboardMarkup) {
    let pages = currency_page_count(currencies.len());
    let page = page.min(pages - 1);
    let start = page * CURRENCIES_PER_PAGE;
    let end = (start + CURRENCIES_PER_PAGE).min(currencies.len());

    let mut rows: Vec<Vec<InlineKeyboardButton>> = currencies[start..end]
        .chunks(CURRENCY_BUTTONS_PER_ROW)
        .map(|chunk| {
            chunk
                .iter()
                .map(|currency| {
                    button(
                        currency.to_uppercase(),
                        CallbackAction::SelectCurrency {
                            cart_id,
                            currency: currency.clone(),
                        },
                    )
                })
                .collect()
        })
        .collect();

    let mut nav = Vec::new();
    if page > 0 {
        nav.push(button(
            t_lang("btn-prev-page", language_code),
            CallbackAction::CurrencyPage {
                cart_id,
                page: page - 1,
            },
        ));
    }
    if page + 1 < pages {
        nav.push(button(
            t_lang("btn-next-page", language_code),
            CallbackAction::CurrencyPage {
                cart_id,
                page: page + 1,
            },
        ));
    }
    if !nav.is_empty() {
        rows.push(nav);
    }
    rows.push(vec![button(
        t_lang("btn-back-to-cart", language_code),
        CallbackAction::ViewCart,
    )]);

    (page, InlineKeyboardMarkup::new(rows))
}

pub fn status_label(status: OrderStatus, language_code: Option<&str>) -> String {
    let key = match status {
        OrderStatus::AwaitingPayment => "status-awaiting-payment",
        OrderStatus::AwaitingAddress => "status-awaiting-address",
        OrderStatus::AwaitingNote => "status-awaiting-note",
        OrderStatus::Paid => "status-paid",
        OrderStatus::Underpaid => "status-underpaid",
        OrderStatus::Overpaid => "status-overpaid",
        OrderStatus::Failed => "status-failed",
    };
    t_lang(key, language_code)
}

pub fn order_history_text(
    orders: &[Order],
    price_currency: &str,
    language_code: Option<&str>,
) -> String {
    if orders.is_empty() {
        return t_lang("orders-empty", language_code);
    }
    let currency = price_currency.to_uppercase();
    let mut text = t_lang("orders-title", language_code);
    for order in orders {
        text.push_str(&format!(
            "\n\n#{} · {}\n{} {} · {} · {}",
            order.short_id(),
            order.created_at.format("%Y-%m-%d"),
            format_price(order.price),
            currency,
            order.pay_currency.to_uppercase(),
            status_label(order.status, language_code),
        ));
        text.push_str(&format!("\n{}", html::escape(&order.description)));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callback_data(keyboard: &InlineKeyboardMarkup) -> Vec<Vec<String>> {
        keyboard
            .inline_keyboard
            .iter()
            .map(|row| {
                row.iter()
                    .filter_map(|b| match &b.kind {
                        InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .collect()
    }

    fn tickers(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("c{i}")).collect()
    }

    #[test]
    fn test_currency_page_layout() {
        let cart_id = Uuid::new_v4();
        let (page, keyboard) = currency_keyboard(cart_id, &tickers(65), 0, None);
        assert_eq!(page, 0);
        let rows = callback_data(&keyboard);
        // 6 rows of 5 currencies, nav row, back row
        assert_eq!(rows.len(), 8);
        assert!(rows[..6].iter().all(|r| r.len() == 5));
        assert_eq!(rows[6], vec![format!("cur:{cart_id}:1")]);
    }

    #[test]
    fn test_out_of_range_page_is_clamped() {
        let cart_id = Uuid::new_v4();
        let (page, keyboard) = currency_keyboard(cart_id, &tickers(65), 99, None);
        assert_eq!(page, 2);
        let rows = callback_data(&keyboard);
        assert_eq!(rows[0].len(), 5);
        assert_eq!(rows[0][0], format!("pay:{cart_id}:c60"));
        assert_eq!(rows[1], vec![format!("cur:{cart_id}:1")]);
    }

    #[test]
    fn test_empty_currency_list_has_single_page() {
        let (page, keyboard) = currency_keyboard(Uuid::new_v4(), &[], 4, None);
        assert_eq!(page, 0);
        assert_eq!(callback_data(&keyboard), vec![vec!["cart".to_string()]]);
    }

    #[test]
    fn test_amount_formatting() {
        use rust_decimal_macros::dec;
        assert_eq!(format_price(dec!(45)), "45.00");
        assert_eq!(format_amount(dec!(0.00123000)), "0.00123");
    }

    #[test]
    fn test_product_card_escapes_labels() {
        use crate::shop_model::{PriceTier, Product};
        use rust_decimal_macros::dec;

        let product_id = Uuid::new_v4();
        let item = ProductWithTiers {
            product: Product {
                id: product_id,
                category_id: Uuid::new_v4(),
                name: "Tea & Co".to_string(),
                description: None,
                unit: "<bag>".to_string(),
                image_url: None,
                video_url: None,
            },
            price_tiers: vec![PriceTier {
                id: Uuid::new_v4(),
                product_id,
                label: "<500g & more".to_string(),
                price: dec!(10),
            }],
        };

        let (caption, keyboard) = product_card(&item, "usd", Some("en"));
        assert!(!caption.contains("<500g"));
        assert!(!caption.contains("<bag>"));
        assert!(caption.starts_with("<b>Tea &amp; Co</b>"));
        assert!(caption.contains("&lt;500g &amp; more"));
        assert!(caption.contains("&lt;bag&gt;"));
        // Button text is not parsed as HTML
        assert!(keyboard.inline_keyboard[0][0].text.contains("<500g & more"));
    }
}
