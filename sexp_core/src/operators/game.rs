//! Operators that query or act on the host game through [`GameContext`].
//!
//! [`GameContext`]: crate::context::GameContext

use crate::context::ShipStatus;
use crate::eval::{EvalError, Frame};
use crate::ledger::Directive;
use crate::registry::{
    OperatorFlags, OperatorHandler, OperatorRegistry, ReturnType, Signature, TypeConstraint,
};
use crate::value::{Truth, Value};

use super::{all_of, define, number_arg, text_arg};

const SHIPS: &[TypeConstraint] = &[TypeConstraint::ShipRef];
const WINGS: &[TypeConstraint] = &[TypeConstraint::WingRef];

fn destroyed_truth(status: Option<ShipStatus>) -> Truth {
    match status {
        Some(ShipStatus::Destroyed) => Truth::KnownTrue,
        Some(ShipStatus::Departed) => Truth::KnownFalse,
        Some(ShipStatus::Present | ShipStatus::NotArrived) => Truth::False,
        None => Truth::Unknown,
    }
}

fn departed_truth(status: Option<ShipStatus>) -> Truth {
    match status {
        Some(ShipStatus::Departed) => Truth::KnownTrue,
        Some(ShipStatus::Destroyed) => Truth::KnownFalse,
        Some(ShipStatus::Present | ShipStatus::NotArrived) => Truth::False,
        None => Truth::Unknown,
    }
}

fn arrived_truth(status: Option<ShipStatus>) -> Truth {
    match status {
        Some(status) if status.has_arrived() => Truth::KnownTrue,
        Some(_) => Truth::False,
        None => Truth::Unknown,
    }
}

/// Applies a per-ship reading to every argument and combines the results.
fn every_ship(
    operator: &'static str,
    args: &[Value],
    frame: &mut Frame<'_, '_>,
    reading: fn(Option<ShipStatus>) -> Truth,
) -> Result<Value, EvalError> {
    let mut truths = Vec::with_capacity(args.len());
    for index in 0..args.len() {
        let ship = text_arg(operator, args, index)?;
        truths.push(reading(frame.game().ship_status(ship)));
    }
    Ok(all_of(truths).into())
}

pub(super) fn register(registry: &mut OperatorRegistry) {
    register_time(registry);
    register_queries(registry);
    register_actions(registry);
}

fn register_time(registry: &mut OperatorRegistry) {
    define(
        registry,
        "mission-time",
        Signature::new(0, Some(0), ReturnType::Number),
        OperatorHandler::eager(|_, frame| Ok(Value::Number(frame.now()))),
        "Seconds since the mission started.",
    );
    define(
        registry,
        "has-time-elapsed",
        Signature::new(1, Some(1), ReturnType::Boolean).args(&[TypeConstraint::Number]),
        OperatorHandler::eager(|args, frame| {
            let seconds = number_arg("has-time-elapsed", args, 0)?;
            Ok(if frame.now() >= seconds {
                Truth::KnownTrue
            } else {
                Truth::False
            }
            .into())
        }),
        "True once the mission clock reaches the argument.",
    );
}

fn register_queries(registry: &mut OperatorRegistry) {
    define(
        registry,
        "is-destroyed",
        Signature::new(1, None, ReturnType::Boolean).args(SHIPS),
        OperatorHandler::eager(|args, frame| {
            every_ship("is-destroyed", args, frame, destroyed_truth)
        }),
        "True when every named ship was destroyed; settled false if one departed.",
    );
    define(
        registry,
        "has-departed",
        Signature::new(1, None, ReturnType::Boolean).args(SHIPS),
        OperatorHandler::eager(|args, frame| {
            every_ship("has-departed", args, frame, departed_truth)
        }),
        "True when every named ship departed; settled false if one was destroyed.",
    );
    define(
        registry,
        "has-arrived",
        Signature::new(1, None, ReturnType::Boolean).args(SHIPS),
        OperatorHandler::eager(|args, frame| {
            every_ship("has-arrived", args, frame, arrived_truth)
        }),
        "True once every named ship has entered the mission.",
    );
    define(
        registry,
        "hits-left",
        Signature::new(1, Some(1), ReturnType::Number).args(SHIPS),
        OperatorHandler::eager(|args, frame| {
            let ship = text_arg("hits-left", args, 0)?;
            if let Some(hull) = frame.game().ship_hull(ship) {
                return Ok(Value::Number(hull));
            }
            Ok(match frame.game().ship_status(ship) {
                Some(ShipStatus::Destroyed) => Value::Number(0.0),
                _ => Value::Unknown,
            })
        }),
        "Remaining hull percentage of a ship in the mission.",
    );
    define(
        registry,
        "ship-exists",
        Signature::new(1, Some(1), ReturnType::Boolean).args(SHIPS),
        OperatorHandler::eager(|args, frame| {
            let ship = text_arg("ship-exists", args, 0)?;
            Ok(Value::bool(frame.game().ship_exists(ship)))
        }),
        "True while the ship is present in the mission.",
    );
    define(
        registry,
        "wing-has-arrived",
        Signature::new(1, Some(1), ReturnType::Boolean).args(WINGS),
        OperatorHandler::eager(|args, frame| {
            let wing = text_arg("wing-has-arrived", args, 0)?;
            Ok(match frame.game().wing_arrived(wing) {
                Some(true) => Truth::KnownTrue,
                Some(false) => Truth::False,
                None => Truth::Unknown,
            }
            .into())
        }),
        "True once any ship of the wing has arrived.",
    );
    define(
        registry,
        "percent-wing-destroyed",
        Signature::new(1, Some(1), ReturnType::Number).args(WINGS),
        OperatorHandler::eager(|args, frame| {
            let wing = text_arg("percent-wing-destroyed", args, 0)?;
            Ok(frame
                .game()
                .wing_destroyed_fraction(wing)
                .map_or(Value::Unknown, |fraction| Value::Number(fraction * 100.0)))
        }),
        "Percentage of the wing's ships destroyed so far.",
    );
}

fn register_actions(registry: &mut OperatorRegistry) {
    let action = |min: usize, max: Option<usize>, args: &[TypeConstraint]| {
        Signature::new(min, max, ReturnType::Action)
            .args(args)
            .flags(OperatorFlags::SIDE_EFFECT)
    };

    define(
        registry,
        "send-message",
        action(2, Some(2), &[TypeConstraint::String]),
        OperatorHandler::eager(|args, frame| {
            let persona = text_arg("send-message", args, 0)?;
            let text = text_arg("send-message", args, 1)?;
            tracing::debug!(target: "sexp::eval", persona, "action.send_message");
            frame.game().send_message(persona, text);
            Ok(Truth::True.into())
        }),
        "Delivers a message from the named persona.",
    );
    define(
        registry,
        "spawn-wing",
        action(1, None, WINGS),
        OperatorHandler::eager(|args, frame| {
            let mut all_spawned = true;
            for index in 0..args.len() {
                let wing = text_arg("spawn-wing", args, index)?;
                if !frame.game().spawn_wing(wing) {
                    tracing::warn!(target: "sexp::eval", wing, "action.spawn_wing_rejected");
                    all_spawned = false;
                }
            }
            Ok(Value::bool(all_spawned))
        }),
        "Brings the named wings into the mission.",
    );
    define(
        registry,
        "self-destruct",
        action(1, None, SHIPS),
        OperatorHandler::eager(|args, frame| {
            for index in 0..args.len() {
                let ship = text_arg("self-destruct", args, index)?;
                if !frame.game().destroy_ship(ship) {
                    tracing::debug!(target: "sexp::eval", ship, "action.self_destruct_skipped");
                }
            }
            Ok(Truth::True.into())
        }),
        "Destroys the named ships that are present.",
    );
    define(
        registry,
        "invalidate-goal",
        action(1, None, &[TypeConstraint::String]),
        OperatorHandler::eager(|args, frame| goal_directive("invalidate-goal", args, frame, true)),
        "Marks goals invalid from the next goal pass on.",
    );
    define(
        registry,
        "validate-goal",
        action(1, None, &[TypeConstraint::String]),
        OperatorHandler::eager(|args, frame| goal_directive("validate-goal", args, frame, false)),
        "Marks goals valid again from the next goal pass on.",
    );
    define(
        registry,
        "do-nothing",
        Signature::new(0, Some(0), ReturnType::Action),
        OperatorHandler::eager(|_, _| Ok(Truth::True.into())),
        "Placeholder action.",
    );
}

fn goal_directive(
    operator: &'static str,
    args: &[Value],
    frame: &mut Frame<'_, '_>,
    invalidate: bool,
) -> Result<Value, EvalError> {
    for index in 0..args.len() {
        let goal = text_arg(operator, args, index)?.to_string();
        let directive = if invalidate {
            Directive::InvalidateGoal(goal)
        } else {
            Directive::ValidateGoal(goal)
        };
        frame.ledger().push_directive(directive);
    }
    Ok(Truth::True.into())
}

#[cfg(test)]
mod tests {
    use crate::context::ShipStatus;
    use crate::ledger::Directive;
    use crate::testing::Harness;
    use crate::value::Truth;

    fn harness() -> Harness {
        let mut h = Harness::new();
        h.game = std::mem::take(&mut h.game)
            .with_ship("Enemy Fighter", ShipStatus::Present, 80.0)
            .with_ship("Freighter", ShipStatus::NotArrived, 100.0)
            .with_ship("Scout", ShipStatus::Departed, 100.0);
        h.game.wings.insert("alpha".into(), (false, 0.0));
        h.game.wings.insert("beta".into(), (true, 0.5));
        h
    }

    #[test]
    fn is_destroyed_is_three_valued() {
        let mut h = harness();
        assert_eq!(h.eval("(is-destroyed \"Enemy Fighter\")").truth(), Truth::False);
        assert_eq!(h.eval("(is-destroyed \"Scout\")").truth(), Truth::KnownFalse);
        assert_eq!(h.eval("(is-destroyed \"Ghost\")").truth(), Truth::Unknown);
        h.game.set_ship("Enemy Fighter", ShipStatus::Destroyed);
        assert_eq!(h.eval("(is-destroyed \"Enemy Fighter\")").truth(), Truth::KnownTrue);
        assert_eq!(h.eval("(has-departed \"Enemy Fighter\")").truth(), Truth::KnownFalse);
        assert_eq!(h.eval("(has-departed \"Scout\")").truth(), Truth::KnownTrue);
    }

    #[test]
    fn arrival_and_hull_queries() {
        let mut h = harness();
        assert_eq!(h.eval("(has-arrived \"Freighter\")").truth(), Truth::False);
        assert_eq!(h.eval("(has-arrived \"Scout\")").truth(), Truth::KnownTrue);
        assert_eq!(h.eval("(hits-left \"Enemy Fighter\")").as_number(), Some(80.0));
        assert!(h.eval("(hits-left \"Freighter\")").is_unknown());
        assert!(h.eval("(ship-exists \"Enemy Fighter\")").is_true());
        assert!(!h.eval("(ship-exists \"Freighter\")").is_true());
        assert_eq!(h.eval("(percent-wing-destroyed \"Beta\")").as_number(), Some(50.0));
        assert_eq!(h.eval("(wing-has-arrived \"Beta\")").truth(), Truth::KnownTrue);
        assert_eq!(h.eval("(wing-has-arrived \"Alpha\")").truth(), Truth::False);
    }

    #[test]
    fn time_operators_follow_the_clock() {
        let mut h = harness();
        h.game.time = 12.5;
        assert_eq!(h.eval("(mission-time)").as_number(), Some(12.5));
        assert_eq!(h.eval("(has-time-elapsed 10)").truth(), Truth::KnownTrue);
        assert_eq!(h.eval("(has-time-elapsed 20)").truth(), Truth::False);
    }

    #[test]
    fn actions_go_through_the_game() {
        let mut h = harness();
        assert!(h.eval("(spawn-wing \"Alpha\")").is_true());
        assert!(!h.eval("(spawn-wing \"Alpha\")").is_true());
        assert_eq!(h.game.spawned, vec!["Alpha".to_string()]);
        h.eval("(self-destruct \"Enemy Fighter\")");
        assert_eq!(
            h.eval("(is-destroyed \"Enemy Fighter\")").truth(),
            Truth::KnownTrue
        );
        h.eval("(invalidate-goal \"Protect Freighter\" \"Scan\")");
        assert_eq!(
            h.ledger.pending_directives(),
            &[
                Directive::InvalidateGoal("Protect Freighter".into()),
                Directive::InvalidateGoal("Scan".into()),
            ]
        );
        assert!(h.eval("(do-nothing)").is_true());
    }
}
