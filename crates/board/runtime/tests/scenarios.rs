//! End-to-end board scenarios

use board_runtime::{BoardOfDirectors, HandlerError};
use board_types::{Action, BoardError, BoardEvent, Command, ErrorKind, Identity};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

fn id(name: &str) -> Identity {
    Identity::new(name)
}

/// Board whose "election" handler is given the engine it runs inside
fn reentrant_board<F>(handler: F) -> Arc<BoardOfDirectors>
where
    F: Fn(&BoardOfDirectors, &Action) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    let board = Arc::new(
        BoardOfDirectors::builder("self", "voting")
            .members(["m1", "m2", "m3"])
            .owners(["o1"])
            .with_journal(true)
            .build()
            .unwrap(),
    );
    let weak = Arc::downgrade(&board);
    board
        .register_handler(
            id("election"),
            Arc::new(move |action: &Action| -> Result<(), HandlerError> {
                let board = weak
                    .upgrade()
                    .ok_or_else(|| HandlerError::new("board dropped"))?;
                handler(&board, action)
            }),
        )
        .unwrap();
    board
}

fn within_timeout<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("call did not return within 5s")
}

fn counting_board(members: &[&str]) -> (BoardOfDirectors, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let board = BoardOfDirectors::builder("self", "voting")
        .members(members.iter().copied())
        .owners(["o1"])
        .handler(
            "bank",
            Arc::new(move |_: &Action| -> Result<(), HandlerError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .with_journal(true)
        .build()
        .unwrap();
    (board, calls)
}

#[test]
fn scenario_majority_auto_executes() {
    let (board, calls) = counting_board(&["m1", "m2", "m3"]);

    let a0 = board
        .propose(&id("m1"), id("bank"), "pay", Command::pay(id("alice"), 250))
        .unwrap();
    assert_eq!(board.approval_count(a0).unwrap(), 1);
    assert!(!board.is_executed(a0).unwrap());

    board.approve(a0, &id("m2")).unwrap();
    assert_eq!(board.approval_count(a0).unwrap(), 2);
    assert!(board.is_executed(a0).unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let err = board.approve(a0, &id("m3")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(board.action(a0).unwrap().executed_at.is_some());
}

#[test]
fn scenario_membership_wholesale_replace() {
    let (board, _) = counting_board(&["m1", "m2"]);

    board
        .replace_members(&id("voting"), vec![id("m2"), id("m3")])
        .unwrap();

    assert!(!board.is_member(&id("m1")));
    assert!(board.is_member(&id("m2")));
    assert!(board.is_member(&id("m3")));
    assert_eq!(board.board_size(), 2);

    // The removed member can no longer propose
    assert_eq!(
        board
            .propose(&id("m1"), id("bank"), "pay", Command::pay(id("a"), 1))
            .unwrap_err(),
        BoardError::NotMember(id("m1"))
    );
}

#[test]
fn scenario_self_targeted_owner_mutation() {
    let (board, _) = counting_board(&["m1", "m2", "m3"]);

    let a1 = board
        .propose(&id("m1"), id("self"), "addOwner", Command::add_owner(id("o2")))
        .unwrap();
    assert_eq!(board.approval_count(a1).unwrap(), 1);

    board.approve(a1, &id("m2")).unwrap();
    assert!(board.is_executed(a1).unwrap());
    assert_eq!(*board.owners(), BTreeSet::from([id("o1"), id("o2")]));

    // Same mutation again: reaches threshold, fails, and rolls back
    let a2 = board
        .propose(&id("m1"), id("self"), "addOwner", Command::add_owner(id("o2")))
        .unwrap();
    let journal = board.journal().unwrap();
    let events_before = journal.len();

    let err = board.approve(a2, &id("m2")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExecutionFailure);
    assert_eq!(board.approval_count(a2).unwrap(), 1);
    assert!(!board.is_approved(a2, &id("m2")).unwrap());
    assert!(!board.is_executed(a2).unwrap());
    assert_eq!(*board.owners(), BTreeSet::from([id("o1"), id("o2")]));
    assert_eq!(journal.len(), events_before);

    // The rolled-back approver may try again later
    assert!(matches!(
        board.approve(a2, &id("m2")),
        Err(BoardError::ExecutionFailure { .. })
    ));
}

#[test]
fn scenario_revoke_before_threshold() {
    let (board, calls) = counting_board(&["m1", "m2", "m3", "m4", "m5"]);

    let a0 = board
        .propose(&id("m1"), id("bank"), "pay", Command::pay(id("alice"), 1))
        .unwrap();
    board.revoke(a0, &id("m1")).unwrap();

    assert_eq!(board.approval_count(a0).unwrap(), 0);
    assert!(!board.is_executed(a0).unwrap());
    assert_eq!(board.pending_actions(), vec![a0]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Re-approval starts the count again
    board.approve(a0, &id("m1")).unwrap();
    board.approve(a0, &id("m2")).unwrap();
    assert!(!board.is_executed(a0).unwrap());
    board.approve(a0, &id("m3")).unwrap();
    assert!(board.is_executed(a0).unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn failing_handler_rolls_back_approval() {
    let board = BoardOfDirectors::builder("self", "voting")
        .members(["m1", "m2", "m3"])
        .owners(["o1"])
        .handler(
            "bank",
            Arc::new(|_: &Action| -> Result<(), HandlerError> {
                Err(HandlerError::new("insufficient funds"))
            }),
        )
        .build()
        .unwrap();

    let a0 = board
        .propose(&id("m1"), id("bank"), "pay", Command::pay(id("alice"), 10))
        .unwrap();
    let err = board.approve(a0, &id("m2")).unwrap_err();

    assert!(err.to_string().contains("insufficient funds"));
    assert!(err.is_retryable());
    assert_eq!(board.approval_count(a0).unwrap(), 1);
    assert!(!board.is_approved(a0, &id("m2")).unwrap());
    assert!(!board.is_executed(a0).unwrap());
}

#[test]
fn single_member_board_executes_on_reapproval() {
    let (board, calls) = counting_board(&["solo"]);

    let a0 = board
        .propose(&id("solo"), id("bank"), "pay", Command::pay(id("alice"), 1))
        .unwrap();
    // Proposing alone never executes, even when the proposer is a majority
    assert!(!board.is_executed(a0).unwrap());

    board.revoke(a0, &id("solo")).unwrap();
    board.approve(a0, &id("solo")).unwrap();

    assert!(board.is_executed(a0).unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn replace_owners_via_quorum() {
    let (board, _) = counting_board(&["m1", "m2"]);

    let a0 = board
        .propose(
            &id("m1"),
            id("self"),
            "rotate owners",
            Command::replace_owners(vec![id("o7"), id("o8")]),
        )
        .unwrap();
    board.approve(a0, &id("m2")).unwrap();

    assert!(!board.is_owner(&id("o1")));
    assert!(board.is_owner(&id("o7")));
    assert!(board.is_owner(&id("o8")));

    let events = board.journal().unwrap().events();
    assert!(events.contains(&BoardEvent::OwnersChanged {
        owners: vec![id("o7"), id("o8")]
    }));
}

#[test]
fn owner_cannot_bypass_quorum() {
    let (board, _) = counting_board(&["m1", "m2", "m3"]);

    assert_eq!(
        board.add_owner(&id("o1"), id("o2")),
        Err(BoardError::OnlySelf)
    );
    assert_eq!(board.owner_count(), 1);
}

#[test]
fn non_member_cannot_revoke() {
    let (board, _) = counting_board(&["m1", "m2", "m3", "m4", "m5"]);
    let a0 = board
        .propose(&id("m1"), id("bank"), "pay", Command::pay(id("alice"), 1))
        .unwrap();

    let err = board.revoke(a0, &id("outsider")).unwrap_err();
    assert_eq!(err, BoardError::NotMember(id("outsider")));
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    // A member dropped from the board loses the right to withdraw
    board
        .replace_members(&id("voting"), vec![id("m2"), id("m3"), id("m4")])
        .unwrap();
    let err = board.revoke(a0, &id("m1")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(board.approval_count(a0).unwrap(), 1);
    assert!(board.is_approved(a0, &id("m1")).unwrap());

    // A current member who never approved gets a state error instead
    let err = board.revoke(a0, &id("m2")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[test]
fn handler_replacing_board_is_rolled_back() {
    let inner = Arc::new(Mutex::new(None));
    let seen = inner.clone();
    let board = reentrant_board(move |board, _| {
        let result = board.replace_members(&id("voting"), vec![id("m9")]);
        *seen.lock().unwrap() = result.clone().err();
        result.map_err(|err| HandlerError::new(err.to_string()))
    });
    let a0 = board
        .propose(&id("m1"), id("election"), "elect m9", Command::custom("elect", vec![]))
        .unwrap();
    let events_before = board.journal().unwrap().len();

    let engine = board.clone();
    let err = within_timeout(move || engine.approve(a0, &id("m2")).unwrap_err());

    assert!(matches!(err, BoardError::ExecutionFailure { action_id, .. } if action_id == a0));
    assert_eq!(err.kind(), ErrorKind::ExecutionFailure);
    let inner = inner.lock().unwrap().clone().unwrap();
    assert_eq!(inner, BoardError::Reentrant("replace_members"));
    assert_eq!(inner.kind(), ErrorKind::InvalidState);

    assert_eq!(board.approval_count(a0).unwrap(), 1);
    assert!(!board.is_executed(a0).unwrap());
    assert_eq!(board.board_size(), 3);
    assert!(!board.is_member(&id("m9")));
    assert_eq!(board.journal().unwrap().len(), events_before);

    // Outside a dispatch the same replacement goes through
    board
        .replace_members(&id("voting"), vec![id("m9")])
        .unwrap();
    assert_eq!(board.board_size(), 1);
}

#[test]
fn handler_reads_engine_during_execution() {
    let observed = Arc::new(Mutex::new(Vec::new()));
    let log = observed.clone();
    let board = reentrant_board(move |board, action| {
        let mut log = log.lock().unwrap();
        log.push(format!("member:{}", board.is_member(&id("m2"))));
        log.push(format!("size:{}", board.board_size()));
        log.push(format!("count:{}", board.approval_count(action.id).unwrap()));
        log.push(format!("pending:{}", board.pending_actions().contains(&action.id)));
        log.push(format!("approve:{}", board.approve(action.id, &id("m3")).unwrap_err().kind()));
        log.push(format!("revoke:{}", board.revoke(action.id, &id("m1")).unwrap_err().kind()));
        let next = board
            .propose(&id("m1"), id("election"), "follow-up", Command::custom("elect", vec![]))
            .unwrap();
        log.push(format!("proposed:{next}"));
        Ok(())
    });
    let a0 = board
        .propose(&id("m1"), id("election"), "elect", Command::custom("elect", vec![]))
        .unwrap();

    let engine = board.clone();
    within_timeout(move || engine.approve(a0, &id("m2"))).unwrap();

    assert!(board.is_executed(a0).unwrap());
    assert_eq!(board.approval_count(a0).unwrap(), 2);
    assert_eq!(
        *observed.lock().unwrap(),
        vec![
            "member:true",
            "size:3",
            "count:1",
            "pending:true",
            "approve:invalid_state",
            "revoke:invalid_state",
            "proposed:A1",
        ]
    );
    assert_eq!(board.pending_actions(), vec![board_types::ActionId::new(1)]);
}
