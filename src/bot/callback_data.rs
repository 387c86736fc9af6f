//! Inline button payloads.
//!
//! Telegram limits callback data to 64 bytes, so payloads stay short:
//! `tag[:arg[:arg]]` with UUIDs in hyphenated form.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    MainMenu,
    Browse,
    OpenCategory(Uuid),
    AddToCart(Uuid),
    ViewCart,
    RemoveItem(Uuid),
    ClearCart(Uuid),
    Checkout(Uuid),
    CurrencyPage { cart_id: Uuid, page: usize },
    SelectCurrency { cart_id: Uuid, currency: String },
    OrderHistory,
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::MainMenu => write!(f, "main_menu"),
            CallbackAction::Browse => write!(f, "browse"),
            CallbackAction::OpenCategory(id) => write!(f, "cat:{id}"),
            CallbackAction::AddToCart(id) => write!(f, "add:{id}"),
            CallbackAction::ViewCart => write!(f, "cart"),
            CallbackAction::RemoveItem(id) => write!(f, "rm:{id}"),
            CallbackAction::ClearCart(id) => write!(f, "clear:{id}"),
            CallbackAction::Checkout(id) => write!(f, "checkout:{id}"),
            CallbackAction::CurrencyPage { cart_id, page } => write!(f, "cur:{cart_id}:{page}"),
            CallbackAction::SelectCurrency { cart_id, currency } => {
                write!(f, "pay:{cart_id}:{currency}")
            }
            CallbackAction::OrderHistory => write!(f, "orders"),
        }
    }
}

fn uuid_arg(arg: Option<&str>, data: &str) -> Result<Uuid, String> {
    arg.and_then(|a| Uuid::parse_str(a).ok())
        .ok_or_else(|| format!("invalid id in callback data: {data}"))
}

impl FromStr for CallbackAction {
    type Err = String;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut parts = data.splitn(3, ':');
        let tag = parts.next().unwrap_or_default();
        let first = parts.next();
        let second = parts.next();

        let action = match (tag, first, second) {
            ("main_menu", None, None) => CallbackAction::MainMenu,
            ("browse", None, None) => CallbackAction::Browse,
            ("cart", None, None) => CallbackAction::ViewCart,
            ("orders", None, None) => CallbackAction::OrderHistory,
            ("cat", Some(_), None) => CallbackAction::OpenCategory(uuid_arg(first, data)?),
            ("add", Some(_), None) => CallbackAction::AddToCart(uuid_arg(first, data)?),
            ("rm", Some(_), None) => CallbackAction::RemoveItem(uuid_arg(first, data)?),
            ("clear", Some(_), None) => CallbackAction::ClearCart(uuid_arg(first, data)?),
            ("checkout", Some(_), None) => CallbackAction::Checkout(uuid_arg(first, data)?),
            ("cur", Some(_), Some(page)) => CallbackAction::CurrencyPage {
                cart_id: uuid_arg(first, data)?,
                page: page
                    .parse()
                    .map_err(|_| format!("invalid page in callback data: {data}"))?,
            },
            ("pay", Some(_), Some(currency)) if !currency.is_empty() => {
                CallbackAction::SelectCurrency {
                    cart_id: uuid_arg(first, data)?,
                    currency: currency.to_lowercase(),
                }
            }
            _ => return Err(format!("unknown callback data: {data}")),
        };
        Ok(action)
    }
}
