mod common;

use common::{register, spawn_app};
use pixelgram::error::AppError;

#[tokio::test]
async fn test_alice_messages_bob_scenario() {
    let app = spawn_app().await;
    let state = &app.state;
    let (alice, _) = register(state, "alice").await;
    let (bob, _) = register(state, "bob").await;

    let before = state.chat_service.get_unread_message_count(bob).await.unwrap();
    let message = state.chat_service.send_message(alice, bob, "yo").await.unwrap();
    assert_eq!(
        state.chat_service.get_unread_message_count(bob).await.unwrap(),
        before + 1
    );

    let pushed = app.push.pushes_to(bob, "/queue/messages");
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0]["content"], "yo");
    assert_eq!(pushed[0]["senderId"], alice);

    let chat = state.chat_service.get_chat_by_id(message.chat_id, bob).await.unwrap();
    let recent = chat.recent_messages.expect("single chat carries messages");
    assert_eq!(recent[0].content, "yo");
    assert_eq!(recent[0].sender_id, alice);
    assert_eq!(chat.other_user.user_id, alice);
    assert!(chat.has_unread_messages);

    let flipped = state
        .chat_service
        .mark_messages_as_read(message.chat_id, bob)
        .await
        .unwrap();
    assert_eq!(flipped, 1);
    assert_eq!(state.chat_service.get_unread_message_count(bob).await.unwrap(), 0);

    let receipts = app.push.pushes_to(alice, "/queue/read-receipts");
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0]["chatId"], message.chat_id);
}

#[tokio::test]
async fn test_chat_with_self_fails() {
    let app = spawn_app().await;
    let (alice, _) = register(&app.state, "alice").await;

    assert!(matches!(
        app.state.chat_service.get_or_create_chat(alice, alice).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        app.state.chat_service.send_message(alice, alice, "hi me").await,
        Err(AppError::BadRequest(_))
    ));
}

#[tokio::test]
async fn test_reading_only_touches_messages_addressed_to_reader() {
    let app = spawn_app().await;
    let state = &app.state;
    let (alice, _) = register(state, "alice").await;
    let (bob, _) = register(state, "bob").await;

    let first = state.chat_service.send_message(alice, bob, "hi bob").await.unwrap();
    state.chat_service.send_message(bob, alice, "hi alice").await.unwrap();
    state.chat_service.send_message(bob, alice, "you there?").await.unwrap();

    assert_eq!(state.chat_service.get_unread_message_count(alice).await.unwrap(), 2);
    assert_eq!(state.chat_service.get_unread_message_count(bob).await.unwrap(), 1);

    // both directions share one chat
    let chats = state.chat_service.get_user_chats(alice).await.unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].chat_id, first.chat_id);
    assert_eq!(chats[0].last_message_content.as_deref(), Some("you there?"));

    state
        .chat_service
        .mark_messages_as_read(first.chat_id, alice)
        .await
        .unwrap();
    assert_eq!(state.chat_service.get_unread_message_count(alice).await.unwrap(), 0);
    assert_eq!(state.chat_service.get_unread_message_count(bob).await.unwrap(), 1);
}

#[tokio::test]
async fn test_message_to_unknown_user_is_not_found() {
    let app = spawn_app().await;
    let (alice, _) = register(&app.state, "alice").await;

    assert!(matches!(
        app.state.chat_service.send_message(alice, 404, "anyone?").await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(app.push.total(), 0);
}
