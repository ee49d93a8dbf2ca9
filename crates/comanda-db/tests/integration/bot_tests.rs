use comanda_core::bot::{
    AutomationRuleInput, BotSettings, BotStatus, MatchKind, MessageSource, NewBotMessage,
    RuleTrigger, session_name_for,
};
use comanda_core::error::AppError;
use comanda_core::traits::BotStore;

use crate::integration::common::{seed_customer, seed_user, setup_test_db};

fn keyword_rule(name: &str, pattern: &str, priority: i32) -> AutomationRuleInput {
    AutomationRuleInput {
        name: name.into(),
        trigger: RuleTrigger::Keyword,
        match_kind: MatchKind::Contains,
        pattern: pattern.into(),
        response: format!("{name} reply"),
        priority,
        active: true,
    }
}

#[tokio::test]
async fn bot_is_created_once_per_user() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let bots = db.bot_repo();

    let bot = bots.get_or_create(user.id).await.unwrap();
    assert_eq!(bot.status, BotStatus::Disconnected);
    assert_eq!(bot.session_name, session_name_for(user.id));
    assert!(!bot.ai_enabled);

    let again = bots.get_or_create(user.id).await.unwrap();
    assert_eq!(again.id, bot.id);

    let updated = bots
        .update_settings(
            user.id,
            &BotSettings {
                ai_enabled: true,
                ai_prompt: Some("  Be brief.  ".into()),
            },
        )
        .await
        .unwrap();
    assert!(updated.ai_enabled);
    assert_eq!(updated.ai_prompt.as_deref(), Some("Be brief."));

    let found = bots
        .find_bot_by_session(&bot.session_name)
        .await
        .unwrap()
        .expect("bot by session");
    assert_eq!(found.id, bot.id);
    assert!(bots.find_bot_by_session("user-unknown").await.unwrap().is_none());
}

#[tokio::test]
async fn status_updates_set_and_clear_qr() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let bots = db.bot_repo();
    let bot = bots.get_or_create(user.id).await.unwrap();

    let pending = bots
        .set_bot_status(bot.id, BotStatus::QrPending, Some("qr-data"))
        .await
        .unwrap();
    assert_eq!(pending.status, BotStatus::QrPending);
    assert_eq!(pending.qr_code.as_deref(), Some("qr-data"));

    let connected = bots
        .set_bot_status(bot.id, BotStatus::Connected, None)
        .await
        .unwrap();
    assert_eq!(connected.status, BotStatus::Connected);
    assert!(connected.qr_code.is_none());
}

#[tokio::test]
async fn conversation_upsert_links_customer_and_reports_new() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let ana = seed_customer(&db, user.id, "Ana", "5511988887777").await;
    let bots = db.bot_repo();
    let bot = bots.get_or_create(user.id).await.unwrap();

    let (conversation, is_new) = bots
        .upsert_conversation(&bot, "5511988887777", Some("Ana"))
        .await
        .unwrap();
    assert!(is_new);
    assert_eq!(conversation.customer_id, Some(ana.id));

    let (again, is_new) = bots
        .upsert_conversation(&bot, "5511988887777", None)
        .await
        .unwrap();
    assert!(!is_new);
    assert_eq!(again.id, conversation.id);
    assert_eq!(again.contact_name.as_deref(), Some("Ana"));

    let (stranger, _) = bots
        .upsert_conversation(&bot, "5511900000000", None)
        .await
        .unwrap();
    assert!(stranger.customer_id.is_none());

    let listed = bots.list_conversations(user.id, 50).await.unwrap();
    assert_eq!(listed.len(), 2);

    // Conversations are private to their owner
    let other = seed_user(&db, "other@cantina.test").await;
    let err = bots
        .get_conversation(other.id, conversation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn recent_messages_returns_latest_oldest_first() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let bots = db.bot_repo();
    let bot = bots.get_or_create(user.id).await.unwrap();
    let (conversation, _) = bots
        .upsert_conversation(&bot, "5511988887777", None)
        .await
        .unwrap();

    for i in 0..5 {
        let message = if i % 2 == 0 {
            NewBotMessage::inbound(conversation.id, format!("message {i}"))
        } else {
            NewBotMessage::outbound(conversation.id, MessageSource::Rule, format!("message {i}"))
        };
        bots.save_message(&message).await.unwrap();
    }

    let recent = BotStore::recent_messages(&bots, conversation.id, 3)
        .await
        .unwrap();
    let bodies: Vec<&str> = recent.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["message 2", "message 3", "message 4"]);
    assert_eq!(recent[1].source, MessageSource::Rule);
}

#[tokio::test]
async fn rules_are_ordered_and_executions_recorded() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let bots = db.bot_repo();
    let bot = bots.get_or_create(user.id).await.unwrap();

    let low = bots
        .create_rule(user.id, &keyword_rule("Hours", "hours", 1))
        .await
        .unwrap();
    let high = bots
        .create_rule(user.id, &keyword_rule("Menu", "menu", 10))
        .await
        .unwrap();
    let mut disabled = keyword_rule("Old", "old", 50);
    disabled.active = false;
    bots.create_rule(user.id, &disabled).await.unwrap();

    let all = bots.list_rules(user.id).await.unwrap();
    assert_eq!(all.len(), 3);

    let active = BotStore::active_rules(&bots, user.id).await.unwrap();
    let ids: Vec<_> = active.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![high.id, low.id]);

    let err = bots
        .create_rule(user.id, &keyword_rule("Empty", "  ", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let (conversation, _) = bots
        .upsert_conversation(&bot, "5511988887777", None)
        .await
        .unwrap();
    bots.record_execution(high.id, conversation.id).await.unwrap();
    bots.record_execution(high.id, conversation.id).await.unwrap();
    assert_eq!(bots.execution_count(high.id).await.unwrap(), 2);

    bots.delete_rule(user.id, low.id).await.unwrap();
    let err = bots.delete_rule(user.id, low.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn store_exposes_menu_and_customer() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let other = seed_user(&db, "other@cantina.test").await;
    let ana = seed_customer(&db, user.id, "Ana", "5511988887777").await;
    crate::integration::common::seed_product(&db, user.id, "Taco", 450).await;
    let bots = db.bot_repo();

    let menu = BotStore::menu(&bots, user.id).await.unwrap();
    assert_eq!(menu.len(), 1);

    let found = BotStore::customer(&bots, user.id, ana.id).await.unwrap();
    assert_eq!(found.map(|c| c.name), Some("Ana".to_string()));
    assert!(
        BotStore::customer(&bots, other.id, ana.id)
            .await
            .unwrap()
            .is_none()
    );
}
