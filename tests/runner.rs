use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use reflective_di::{ContainerBuilder, ParameterInfo, Runner, ServiceConfiguration};

#[test]
fn ensure_run_called_runs_dependencies_before_their_parents() {
    struct Child;
    struct Parent {
        #[allow(dead_code)]
        child: Arc<Child>,
    }

    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let mut builder = ContainerBuilder::new();
    builder.register_constructor::<Child>(vec![], |_| Arc::new(Child) as _);
    builder.register_constructor::<Parent>(
        vec![ParameterInfo::new("child", reflective_di::TypeRef::of::<Child>())],
        |args| Arc::new(Parent { child: args[0].clone().downcast::<Child>().unwrap() }) as _,
    );

    let mut child_config = ServiceConfiguration::new();
    let child_order = order.clone();
    child_config.run_hook = Some(Arc::new(move |_any| {
        child_order.lock().unwrap().push("child");
    }));
    builder.register_configuration::<Child>(&[], child_config).unwrap();

    let mut parent_config = ServiceConfiguration::new();
    let parent_order = order.clone();
    parent_config.run_hook = Some(Arc::new(move |_any| {
        parent_order.lock().unwrap().push("parent");
    }));
    builder.register_configuration::<Parent>(&[], parent_config).unwrap();

    let container = builder.build();
    container.resolve::<Parent>(&[]).instance();

    Runner::ensure_run_called(&container);

    assert_eq!(*order.lock().unwrap(), vec!["child", "parent"]);
}

#[test]
fn ensure_run_called_is_idempotent() {
    struct Widget;

    let run_count = Arc::new(AtomicUsize::new(0));
    let mut builder = ContainerBuilder::new();
    builder.register_constructor::<Widget>(vec![], |_| Arc::new(Widget) as _);

    let mut config = ServiceConfiguration::new();
    let counted = run_count.clone();
    config.run_hook = Some(Arc::new(move |_any| {
        counted.fetch_add(1, Ordering::SeqCst);
    }));
    builder.register_configuration::<Widget>(&[], config).unwrap();

    let container = builder.build();
    container.resolve::<Widget>(&[]).instance();

    Runner::ensure_run_called(&container);
    Runner::ensure_run_called(&container);
    Runner::ensure_run_called(&container);

    assert_eq!(run_count.load(Ordering::SeqCst), 1);
}

#[test]
fn ensure_run_called_skips_services_that_failed_to_resolve() {
    struct Broken;

    let run_count = Arc::new(AtomicUsize::new(0));
    let mut builder = ContainerBuilder::new();
    builder.register_constructor::<Broken>(
        vec![ParameterInfo::new("missing", reflective_di::TypeRef::of::<u32>())],
        |_| Arc::new(Broken) as _,
    );
    let mut config = ServiceConfiguration::new();
    let counted = run_count.clone();
    config.run_hook = Some(Arc::new(move |_any| {
        counted.fetch_add(1, Ordering::SeqCst);
    }));
    builder.register_configuration::<Broken>(&[], config).unwrap();

    let container = builder.build();
    let resolved = container.resolve::<Broken>(&[]);
    assert!(!resolved.is_ok());

    Runner::ensure_run_called(&container);

    assert_eq!(run_count.load(Ordering::SeqCst), 0);
}
