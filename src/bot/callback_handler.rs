//! Callback Handler module for processing inline keyboard callback queries

use teloxide::utils::html;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::CategoryView;
use crate::errors::ShopError;
use crate::localization::{t_args_lang, t_lang};

use super::callback_data::CallbackAction;
use super::outbox::BotCommand;
use super::ui_builder::{
    back_keyboard, back_to_menu_keyboard, cart_message, category_keyboard, currency_keyboard,
    currency_page_count, format_amount, format_price, main_menu_keyboard, order_history_text,
    parent_action, product_card,
};
use super::{ConversationDispatcher, Turn, ORDER_HISTORY_LIMIT};

/// Handle one decoded callback action
pub async fn handle_action(
    shop: &ConversationDispatcher,
    turn: &Turn<'_>,
    callback_id: &str,
    action: CallbackAction,
) -> Result<Vec<BotCommand>, ShopError> {
    match action {
        CallbackAction::MainMenu => Ok(vec![
            BotCommand::answer(callback_id),
            main_menu(turn),
        ]),
        CallbackAction::Browse => browse(shop, turn, callback_id).await,
        CallbackAction::OpenCategory(category_id) => {
            open_category(shop, turn, callback_id, category_id).await
        }
        CallbackAction::AddToCart(tier_id) => {
            shop.cart.add(turn.key(), tier_id).await?;
            Ok(vec![BotCommand::answer_with_text(
                callback_id,
                t_lang("cart-added", turn.lang()),
            )])
        }
        CallbackAction::ViewCart => Ok(vec![
            BotCommand::answer(callback_id),
            show_cart(shop, turn).await?,
        ]),
        CallbackAction::RemoveItem(item_id) => {
            shop.cart.remove(turn.key(), item_id).await?;
            Ok(vec![
                BotCommand::answer_with_text(callback_id, t_lang("cart-item-removed", turn.lang())),
                show_cart(shop, turn).await?,
            ])
        }
        CallbackAction::ClearCart(cart_id) => {
            let cart = shop.cart.owned_cart(turn.key(), cart_id).await?;
            shop.cart.clear(cart.id).await?;
            Ok(vec![
                BotCommand::answer_with_text(callback_id, t_lang("cart-cleared", turn.lang())),
                show_cart(shop, turn).await?,
            ])
        }
        CallbackAction::Checkout(cart_id) => {
            currency_page(shop, turn, callback_id, cart_id, 0).await
        }
        CallbackAction::CurrencyPage { cart_id, page } => {
            currency_page(shop, turn, callback_id, cart_id, page).await
        }
        CallbackAction::SelectCurrency { cart_id, currency } => {
            select_currency(shop, turn, callback_id, cart_id, &currency).await
        }
        CallbackAction::OrderHistory => {
            let orders = shop
                .store
                .orders_for_chat(turn.key(), ORDER_HISTORY_LIMIT)
                .await?;
            Ok(vec![
                BotCommand::answer(callback_id),
                BotCommand::replace(
                    turn.chat_id,
                    turn.message_id,
                    order_history_text(&orders, shop.price_currency(), turn.lang()),
                    back_to_menu_keyboard(turn.lang()),
                ),
            ])
        }
    }
}

/// Welcome message with the main menu, in place of the current message
pub fn main_menu(turn: &Turn<'_>) -> BotCommand {
    BotCommand::replace(
        turn.chat_id,
        turn.message_id,
        html::escape(&turn.bot.welcome_message),
        main_menu_keyboard(turn.lang()),
    )
}

async fn browse(
    shop: &ConversationDispatcher,
    turn: &Turn<'_>,
    callback_id: &str,
) -> Result<Vec<BotCommand>, ShopError> {
    let roots = shop.catalog.root_categories(turn.bot.id).await?;
    let command = if roots.is_empty() {
        BotCommand::replace(
            turn.chat_id,
            turn.message_id,
            t_lang("catalog-empty", turn.lang()),
            back_to_menu_keyboard(turn.lang()),
        )
    } else {
        BotCommand::replace(
            turn.chat_id,
            turn.message_id,
            t_lang("catalog-choose-category", turn.lang()),
            category_keyboard(&roots, CallbackAction::MainMenu, turn.lang()),
        )
    };
    Ok(vec![BotCommand::answer(callback_id), command])
}

async fn open_category(
    shop: &ConversationDispatcher,
    turn: &Turn<'_>,
    callback_id: &str,
    category_id: Uuid,
) -> Result<Vec<BotCommand>, ShopError> {
    let view = shop.catalog.open_category(turn.bot.id, category_id).await?;
    let lang = turn.lang();
    let back = parent_action(view.category());
    let name = html::escape(&view.category().name);

    let mut commands = vec![BotCommand::answer(callback_id)];
    match view {
        CategoryView::SubCategories { children, .. } => {
            commands.push(BotCommand::replace(
                turn.chat_id,
                turn.message_id,
                format!("<b>{}</b>\n{}", name, t_lang("catalog-choose-category", lang)),
                category_keyboard(&children, back, lang),
            ));
        }
        CategoryView::Empty { .. } => {
            commands.push(BotCommand::replace(
                turn.chat_id,
                turn.message_id,
                t_args_lang("category-empty", &[("category", &name)], lang),
                back_keyboard(back, lang),
            ));
        }
        CategoryView::Products { products, .. } => {
            debug!(category_id = %category_id, products = products.len(), "Listing products");
            for item in &products {
                let (caption, keyboard) = product_card(item, shop.price_currency(), lang);
                let command = match item.product.image_url.as_deref().filter(|u| !u.is_empty()) {
                    Some(url) => BotCommand::SendPhoto {
                        chat_id: turn.chat_id,
                        photo_url: url.to_string(),
                        caption,
                        keyboard: Some(keyboard),
                    },
                    None => BotCommand::text_with_keyboard(turn.chat_id, caption, keyboard),
                };
                commands.push(command);
            }
            commands.push(BotCommand::text_with_keyboard(
                turn.chat_id,
                t_args_lang("category-footer", &[("category", &name)], lang),
                back_keyboard(back, lang),
            ));
        }
    }
    Ok(commands)
}

async fn show_cart(
    shop: &ConversationDispatcher,
    turn: &Turn<'_>,
) -> Result<BotCommand, ShopError> {
    let view = shop.cart.view(turn.key()).await?;
    let (text, keyboard) = cart_message(&view, shop.price_currency(), turn.lang());
    Ok(BotCommand::replace(
        turn.chat_id,
        turn.message_id,
        text,
        keyboard,
    ))
}

async fn currency_page(
    shop: &ConversationDispatcher,
    turn: &Turn<'_>,
    callback_id: &str,
    cart_id: Uuid,
    page: usize,
) -> Result<Vec<BotCommand>, ShopError> {
    let lang = turn.lang();
    shop.cart.owned_cart(turn.key(), cart_id).await?;
    let currencies = shop.checkout.begin_checkout(cart_id).await?;

    if currencies.is_empty() {
        warn!(chat_id = turn.chat_id, "No payment currencies available");
        return Ok(vec![
            BotCommand::answer(callback_id),
            BotCommand::replace(
                turn.chat_id,
                turn.message_id,
                t_lang("error-payments-unavailable", lang),
                back_keyboard(CallbackAction::ViewCart, lang),
            ),
        ]);
    }

    let (shown, keyboard) = currency_keyboard(cart_id, &currencies, page, lang);
    let pages = currency_page_count(currencies.len());
    let text = format!(
        "{}\n{}",
        t_lang("checkout-choose-currency", lang),
        t_args_lang(
            "currency-page",
            &[
                ("page", &(shown + 1).to_string()),
                ("pages", &pages.to_string())
            ],
            lang
        )
    );
    Ok(vec![
        BotCommand::answer(callback_id),
        BotCommand::replace(turn.chat_id, turn.message_id, text, keyboard),
    ])
}

async fn select_currency(
    shop: &ConversationDispatcher,
    turn: &Turn<'_>,
    callback_id: &str,
    cart_id: Uuid,
    currency: &str,
) -> Result<Vec<BotCommand>, ShopError> {
    let lang = turn.lang();
    shop.cart.owned_cart(turn.key(), cart_id).await?;

    let receipt = match shop
        .checkout
        .select_currency(cart_id, currency, turn.buyer)
        .await
    {
        Ok(receipt) => receipt,
        Err(ShopError::Provider(e)) => {
            warn!(chat_id = turn.chat_id, error = %e, "Checkout failed at the provider");
            return Ok(vec![
                BotCommand::answer(callback_id),
                BotCommand::replace(
                    turn.chat_id,
                    turn.message_id,
                    t_lang("payment-create-failed", lang),
                    back_keyboard(CallbackAction::ViewCart, lang),
                ),
            ]);
        }
        Err(e) => return Err(e),
    };

    let order = &receipt.order;
    let invoice = &receipt.invoice;
    info!(chat_id = turn.chat_id, order_id = %order.id, "Invoice sent to buyer");

    let text = format!(
        "{}\n\n{}\n<code>{}</code>\n\n{}",
        t_args_lang(
            "payment-created",
            &[
                ("order", &order.short_id()),
                ("total", &format_price(order.price)),
                ("currency", &shop.price_currency().to_uppercase()),
            ],
            lang,
        ),
        t_args_lang(
            "payment-instructions",
            &[
                ("amount", &format_amount(invoice.pay_amount)),
                ("currency", &invoice.pay_currency.to_uppercase()),
            ],
            lang,
        ),
        html::escape(&invoice.pay_address),
        t_lang("payment-wait", lang),
    );

    Ok(vec![
        BotCommand::answer(callback_id),
        BotCommand::replace(
            turn.chat_id,
            turn.message_id,
            text,
            back_to_menu_keyboard(lang),
        ),
    ])
}
