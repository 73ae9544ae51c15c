
use uuid::Uuid;

use parley_server::error::AppError;
use parley_server::governance::{self, InviteOutcome};
use parley_server::membership;
use parley_server::messages;
use parley_server::notify::EventKind;

use test_utils::{register_user, test_ctx};

#[tokio::test]
async fn create_group_assigns_roles_and_auto_name() {
    let (ctx, _) = test_ctx();
    let ann = register_user(&ctx, "ann").await;
    let bo = register_user(&ctx, "bo").await;
    let cy = register_user(&ctx, "cy").await;

    let view = governance::create_group(&ctx, ann, vec![bo, cy, bo], None)
        .await
        .unwrap();
    assert_eq!(view.members.len(), 3);
    assert_eq!(view.host.as_ref().unwrap().id, ann);
    assert!(view.admin_ids.is_empty());
    // Name is the joined member list, invitees first.
    assert_eq!(view.name, "bo, cy, ann");
}

#[tokio::test]
async fn long_auto_names_are_truncated() {
    let (ctx, _) = test_ctx();
    let a = register_user(&ctx, "alexandra").await;
    let b = register_user(&ctx, "bartholomew").await;

    let view = governance::create_group(&ctx, a, vec![b], None).await.unwrap();
    assert_eq!(view.name, "bartholomew, alex...");
    assert_eq!(view.name.chars().count(), 20);
}

#[tokio::test]
async fn explicit_group_names_are_kept_verbatim() {
    let (ctx, _) = test_ctx();
    let a = register_user(&ctx, "alexandra").await;
    let b = register_user(&ctx, "bartholomew").await;

    let name = "the very long running book club of 2026".to_string();
    let view = governance::create_group(&ctx, a, vec![b], Some(name.clone()))
        .await
        .unwrap();
    assert_eq!(view.name, name);
}

#[tokio::test]
async fn group_creation_needs_registered_members() {
    let (ctx, _) = test_ctx();
    let ann = register_user(&ctx, "ann").await;

    let err = governance::create_group(&ctx, ann, vec![ann], None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    let err = governance::create_group(&ctx, ann, vec![Uuid::new_v4()], None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn admins_cannot_kick_the_host() {
    let (ctx, notifier) = test_ctx();
    let host = register_user(&ctx, "host").await;
    let m1 = register_user(&ctx, "m1").await;
    let m2 = register_user(&ctx, "m2").await;
    let conv = governance::create_group(&ctx, host, vec![m1, m2], None)
        .await
        .unwrap()
        .id;

    governance::set_admin(&ctx, host, conv, m1).await.unwrap();

    let err = governance::kick(&ctx, m1, conv, host).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // An admin cannot kick a fellow admin either.
    governance::set_admin(&ctx, host, conv, m2).await.unwrap();
    let err = governance::kick(&ctx, m1, conv, m2).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    notifier.clear();
    let view = governance::kick(&ctx, host, conv, m1).await.unwrap();
    assert_eq!(view.members.len(), 2);
    assert!(!view.admin_ids.contains(&m1));
    assert_eq!(notifier.events_for(m1), vec![EventKind::Kicked]);
}

#[tokio::test]
async fn plain_members_cannot_kick() {
    let (ctx, _) = test_ctx();
    let host = register_user(&ctx, "host").await;
    let m1 = register_user(&ctx, "m1").await;
    let m2 = register_user(&ctx, "m2").await;
    let conv = governance::create_group(&ctx, host, vec![m1, m2], None)
        .await
        .unwrap()
        .id;

    let err = governance::kick(&ctx, m1, conv, m2).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = governance::kick(&ctx, host, conv, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn host_transfer_clears_admin_and_demotes_the_old_host() {
    let (ctx, _) = test_ctx();
    let host = register_user(&ctx, "host").await;
    let next = register_user(&ctx, "next").await;
    let conv = governance::create_group(&ctx, host, vec![next], None)
        .await
        .unwrap()
        .id;

    governance::set_admin(&ctx, host, conv, next).await.unwrap();

    let view = governance::set_host(&ctx, host, conv, next).await.unwrap();
    assert_eq!(view.host.as_ref().unwrap().id, next);
    // Host and admin are mutually exclusive.
    assert!(view.admin_ids.is_empty());

    // The old host lost the role and with it the power to transfer again.
    let err = governance::set_host(&ctx, host, conv, host).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn host_transfer_requires_a_member_target() {
    let (ctx, _) = test_ctx();
    let host = register_user(&ctx, "host").await;
    let member = register_user(&ctx, "member").await;
    let outsider = register_user(&ctx, "outsider").await;
    let conv = governance::create_group(&ctx, host, vec![member], None)
        .await
        .unwrap()
        .id;

    let err = governance::set_host(&ctx, host, conv, outsider).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = governance::set_host(&ctx, host, conv, host).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn concurrent_host_transfers_resolve_to_one_winner() {
    let (ctx, _) = test_ctx();
    let host = register_user(&ctx, "host").await;
    let a = register_user(&ctx, "a").await;
    let b = register_user(&ctx, "b").await;
    let conv = governance::create_group(&ctx, host, vec![a, b], None)
        .await
        .unwrap()
        .id;

    let (ra, rb) = tokio::join!(
        governance::set_host(&ctx, host, conv, a),
        governance::set_host(&ctx, host, conv, b),
    );
    // The second attempt finds the actor no longer hosting.
    assert_eq!(ra.is_ok() as u8 + rb.is_ok() as u8, 1);
}

#[tokio::test]
async fn admin_role_transitions_guard_current_state() {
    let (ctx, _) = test_ctx();
    let host = register_user(&ctx, "host").await;
    let m1 = register_user(&ctx, "m1").await;
    let conv = governance::create_group(&ctx, host, vec![m1], None)
        .await
        .unwrap()
        .id;

    // Only the host appoints.
    let err = governance::set_admin(&ctx, m1, conv, m1).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    governance::set_admin(&ctx, host, conv, m1).await.unwrap();
    let err = governance::set_admin(&ctx, host, conv, m1).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    governance::remove_admin(&ctx, host, conv, m1).await.unwrap();
    let err = governance::remove_admin(&ctx, host, conv, m1).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn group_operations_reject_direct_conversations() {
    let (ctx, _) = test_ctx();
    let alice = register_user(&ctx, "alice").await;
    let bob = register_user(&ctx, "bob").await;
    let conv = membership::create_direct(&ctx, alice, bob).await.unwrap().id;

    let err = governance::set_admin(&ctx, alice, conv, bob).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    let err = governance::invite(&ctx, alice, conv, vec![bob]).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    let err = governance::exit_group(&ctx, alice, conv).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

#[tokio::test]
async fn privileged_invites_add_directly() {
    let (ctx, notifier) = test_ctx();
    let host = register_user(&ctx, "host").await;
    let m1 = register_user(&ctx, "m1").await;
    let newcomer = register_user(&ctx, "newcomer").await;
    let conv = governance::create_group(&ctx, host, vec![m1], None)
        .await
        .unwrap()
        .id;

    notifier.clear();
    match governance::invite(&ctx, host, conv, vec![newcomer]).await.unwrap() {
        InviteOutcome::Added(view) => assert_eq!(view.members.len(), 3),
        InviteOutcome::Pending(_) => panic!("host invite should add directly"),
    }
    assert_eq!(notifier.events_for(newcomer), vec![EventKind::GeneralUpdate]);

    let err = governance::invite(&ctx, host, conv, vec![newcomer])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn member_invites_pend_until_accepted() {
    let (ctx, notifier) = test_ctx();
    let host = register_user(&ctx, "host").await;
    let m1 = register_user(&ctx, "m1").await;
    let m2 = register_user(&ctx, "m2").await;
    let newcomer = register_user(&ctx, "newcomer").await;
    let conv = governance::create_group(&ctx, host, vec![m1, m2], None)
        .await
        .unwrap()
        .id;

    notifier.clear();
    let first = match governance::invite(&ctx, m1, conv, vec![newcomer]).await.unwrap() {
        InviteOutcome::Pending(views) => views,
        InviteOutcome::Added(_) => panic!("member invite should pend"),
    };
    assert_eq!(first.len(), 1);
    assert_eq!(notifier.events_for(host), vec![EventKind::GroupRequest]);
    assert!(notifier.events_for(newcomer).is_empty());

    // A second member files an independent invitation for the same person.
    governance::invite(&ctx, m2, conv, vec![newcomer]).await.unwrap();
    assert_eq!(governance::pending_invitations(&ctx, host).await.unwrap().len(), 2);
    // Plain members see no queue.
    assert!(governance::pending_invitations(&ctx, m1).await.unwrap().is_empty());

    // Accepting is privileged.
    let err = governance::accept_invitation(&ctx, m2, first[0].id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let view = governance::accept_invitation(&ctx, host, first[0].id)
        .await
        .unwrap();
    assert_eq!(view.members.len(), 4);
    // Both invitations for that user are consumed by the one accept.
    assert!(governance::pending_invitations(&ctx, host).await.unwrap().is_empty());

    let err = governance::accept_invitation(&ctx, host, first[0].id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn exit_rules_protect_the_host() {
    let (ctx, _) = test_ctx();
    let host = register_user(&ctx, "host").await;
    let m1 = register_user(&ctx, "m1").await;
    let conv = governance::create_group(&ctx, host, vec![m1], None)
        .await
        .unwrap()
        .id;

    let err = governance::exit_group(&ctx, host, conv).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    governance::exit_group(&ctx, m1, conv).await.unwrap();
    assert!(membership::conversation_ids(&ctx, m1).await.is_empty());

    // Now alone, the host may leave; the group and its messages go with them.
    messages::append(&ctx, host, conv, "last words".into(), None)
        .await
        .unwrap();
    governance::exit_group(&ctx, host, conv).await.unwrap();
    assert!(membership::conversation_ids(&ctx, host).await.is_empty());

    let err = messages::list(&ctx, host, Some(conv), 0, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn deleting_a_group_discards_its_invitation_queue() {
    let (ctx, _) = test_ctx();
    let host = register_user(&ctx, "host").await;
    let m1 = register_user(&ctx, "m1").await;
    let outsider = register_user(&ctx, "outsider").await;
    let conv = governance::create_group(&ctx, host, vec![m1], None)
        .await
        .unwrap()
        .id;

    governance::invite(&ctx, m1, conv, vec![outsider]).await.unwrap();
    assert_eq!(governance::pending_invitations(&ctx, host).await.unwrap().len(), 1);

    governance::exit_group(&ctx, m1, conv).await.unwrap();
    governance::exit_group(&ctx, host, conv).await.unwrap();
    assert!(governance::pending_invitations(&ctx, host).await.unwrap().is_empty());
}

#[tokio::test]
async fn notices_are_privileged_and_broadcast() {
    let (ctx, notifier) = test_ctx();
    let host = register_user(&ctx, "host").await;
    let admin = register_user(&ctx, "admin").await;
    let m1 = register_user(&ctx, "m1").await;
    let conv = governance::create_group(&ctx, host, vec![admin, m1], None)
        .await
        .unwrap()
        .id;
    governance::set_admin(&ctx, host, conv, admin).await.unwrap();

    let err = governance::post_notice(&ctx, m1, conv, "nope".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = governance::post_notice(&ctx, admin, conv, "  ".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    notifier.clear();
    let notice = governance::post_notice(&ctx, admin, conv, "meeting at noon".into())
        .await
        .unwrap();
    assert_eq!(notice.author_id, admin);
    assert_eq!(notifier.events_for(m1), vec![EventKind::GroupModified]);

    let views = membership::conversations_view(&ctx, m1, &[conv]).await;
    assert_eq!(views[0].notices.len(), 1);
    assert_eq!(views[0].notices[0].content, "meeting at noon");
}

#[tokio::test]
async fn direct_lifecycle_notifies_both_parties() {
    let (ctx, notifier) = test_ctx();
    let alice = register_user(&ctx, "alice").await;
    let bob = register_user(&ctx, "bob").await;

    membership::create_direct(&ctx, alice, bob).await.unwrap();
    assert_eq!(notifier.events_for(bob), vec![EventKind::FriendRequest]);

    let err = membership::create_direct(&ctx, alice, bob).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    membership::deactivate_direct(&ctx, alice, bob).await.unwrap();
    assert_eq!(
        notifier.events_for(bob),
        vec![EventKind::FriendRequest, EventKind::GeneralUpdate]
    );

    let err = membership::deactivate_direct(&ctx, alice, bob).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    membership::reactivate_direct(&ctx, bob, alice).await.unwrap();
    assert_eq!(
        notifier.events_for(alice),
        vec![
            EventKind::FriendRequest,
            EventKind::GeneralUpdate,
            EventKind::FriendRequest
        ]
    );
}

#[tokio::test]
async fn conversation_views_skip_foreign_ids() {
    let (ctx, _) = test_ctx();
    let alice = register_user(&ctx, "alice").await;
    let bob = register_user(&ctx, "bob").await;
    let carol = register_user(&ctx, "carol").await;
    let ab = membership::create_direct(&ctx, alice, bob).await.unwrap().id;
    let bc = membership::create_direct(&ctx, bob, carol).await.unwrap().id;

    let views = membership::conversations_view(&ctx, alice, &[ab, bc, Uuid::new_v4()]).await;
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].id, ab);
    // Direct conversations borrow the counterpart's avatar for display.
    assert_eq!(views[0].avatar_url, "https://avatars.example/bob.png");
}
