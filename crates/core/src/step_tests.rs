use super::*;

#[test]
fn plain_step_runs_its_closure() {
    let step: Step<()> = Step::new(|ctx: StepContext<()>| {
        let n: i32 = *ctx.value.downcast_ref::<i32>().expect("int value");
        StepOutcome::Value(Some(AnyValue::new(n + 1)))
    });
    let Step::Plain(f) = step else {
        panic!("expected a plain step");
    };
    let out = f(StepContext {
        value: AnyValue::new(41),
        context: &(),
        error: None,
    });
    match out {
        StepOutcome::Value(Some(v)) => assert_eq!(v.downcast_ref::<i32>(), Some(&42)),
        _ => panic!("expected a produced value"),
    }
}

#[test]
fn nested_constructor_ignores_input_and_wraps_the_pipeline() {
    let inner: Pipeline<()> = Pipeline::new(vec![Step::new(|_ctx| StepOutcome::Value(None))]);
    let step = Step::nested(inner.clone());
    let Step::Plain(f) = step else {
        panic!("expected a plain step");
    };
    let out = f(StepContext {
        value: AnyValue::unit(),
        context: &(),
        error: None,
    });
    match out {
        StepOutcome::Nested(p) => assert_eq!(p.id, inner.id),
        _ => panic!("expected a nested outcome"),
    }
}
