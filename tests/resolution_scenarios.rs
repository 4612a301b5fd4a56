use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use reflective_di::{ContainerBuilder, DiError, ParameterInfo, ParameterOverride, ServiceConfiguration};

trait Greeter: Send + Sync {
    fn greet(&self) -> &'static str;
}

struct English;
impl Greeter for English {
    fn greet(&self) -> &'static str {
        "hello"
    }
}

struct French;
impl Greeter for French {
    fn greet(&self) -> &'static str {
        "bonjour"
    }
}

#[test]
fn simple_resolves_the_single_implementation() {
    let mut builder = ContainerBuilder::new();
    builder.register_constructor::<English>(vec![], |_| Arc::new(English) as _);
    builder.register_configuration::<English>(&[], ServiceConfiguration::new()).unwrap();
    builder.register_interface::<dyn Greeter, English>(|e| e as Arc<dyn Greeter>);

    let container = builder.build();
    let greeter = container.resolve_trait::<dyn Greeter>(&[]).instance();
    assert_eq!(greeter.greet(), "hello");
}

#[test]
fn enumerable_collects_every_implementation() {
    let mut builder = ContainerBuilder::new();
    builder.register_constructor::<English>(vec![], |_| Arc::new(English) as _);
    builder.register_configuration::<English>(&[], ServiceConfiguration::new()).unwrap();
    builder.register_constructor::<French>(vec![], |_| Arc::new(French) as _);
    builder.register_configuration::<French>(&[], ServiceConfiguration::new()).unwrap();
    builder.register_interface::<dyn Greeter, English>(|e| e as Arc<dyn Greeter>);
    builder.register_interface::<dyn Greeter, French>(|f| f as Arc<dyn Greeter>);

    let container = builder.build();

    let all = container.resolve_trait::<dyn Greeter>(&[]).instances();
    let mut greetings: Vec<&str> = all.iter().map(|g| g.greet()).collect();
    greetings.sort();
    assert_eq!(greetings, vec!["bonjour", "hello"]);

    let single = container.resolve_trait::<dyn Greeter>(&[]);
    assert!(matches!(single.try_instance(), Err(DiError::ManyImplementations(_))));
}

#[test]
fn contract_scoping_selects_between_configurations() {
    struct Database {
        dsn: &'static str,
    }

    let mut builder = ContainerBuilder::new();
    let mut primary = ServiceConfiguration::new();
    primary.factory = Some(Arc::new(|_| Ok(Arc::new(Database { dsn: "primary" }) as _)));
    builder.register_configuration::<Database>(&["primary"], primary).unwrap();

    let mut secondary = ServiceConfiguration::new();
    secondary.factory = Some(Arc::new(|_| Ok(Arc::new(Database { dsn: "secondary" }) as _)));
    builder.register_configuration::<Database>(&["secondary"], secondary).unwrap();

    let container = builder.build();

    assert_eq!(container.resolve::<Database>(&["primary"]).instance().dsn, "primary");
    assert_eq!(container.resolve::<Database>(&["secondary"]).instance().dsn, "secondary");
    let resolved = container.resolve::<Database>(&["tertiary"]);
    let err = resolved.try_instance().unwrap_err();
    assert!(matches!(err, DiError::Unresolved { .. }));
    assert!(err.to_string().contains("no implementations for"));
}

#[test]
fn cyclic_dependency_is_detected_and_does_not_deadlock() {
    struct A {
        #[allow(dead_code)]
        b: Arc<B>,
    }
    struct B {
        #[allow(dead_code)]
        a: Arc<A>,
    }

    let mut builder = ContainerBuilder::new();
    builder.register_constructor::<A>(vec![ParameterInfo::new("b", reflective_di::TypeRef::of::<B>())], |args| {
        Arc::new(A { b: args[0].clone().downcast::<B>().unwrap() }) as _
    });
    builder.register_configuration::<A>(&[], ServiceConfiguration::new()).unwrap();
    builder.register_constructor::<B>(vec![ParameterInfo::new("a", reflective_di::TypeRef::of::<A>())], |args| {
        Arc::new(B { a: args[0].clone().downcast::<A>().unwrap() }) as _
    });
    builder.register_configuration::<B>(&[], ServiceConfiguration::new()).unwrap();

    let container = builder.build();
    let err = container.resolve::<A>(&[]).try_instance().unwrap_err();
    assert!(matches!(err, DiError::Circular(_)), "unexpected error: {err}");
    assert!(err.to_string().contains("cyclic dependency"), "unexpected message: {err}");
}

#[test]
fn duplicate_contract_in_one_request_is_rejected() {
    let builder = ContainerBuilder::new();
    let container = builder.build();
    let err = container.resolve::<u32>(&["c1", "c1"]).try_instance().unwrap_err();
    assert!(matches!(err, DiError::DuplicateContract(_)));
    assert!(err.to_string().contains("duplicates found"));
}

#[test]
fn unused_parameter_override_is_reported() {
    struct Widget;

    let mut builder = ContainerBuilder::new();
    builder.register_constructor::<Widget>(vec![], |_| Arc::new(Widget) as _);
    let mut config = ServiceConfiguration::new();
    config.parameter_overrides.insert("not_a_real_param", ParameterOverride::ValueAssigned(Arc::new(1u32)));
    builder.register_configuration::<Widget>(&[], config).unwrap();

    let container = builder.build();
    let err = container.resolve::<Widget>(&[]).try_instance().unwrap_err();
    assert!(err.to_string().contains("unused dependency configurations [not_a_real_param]"));
}

#[test]
fn per_request_service_refuses_resolve_but_allows_create() {
    struct Session;

    let mut builder = ContainerBuilder::new();
    builder.register_constructor::<Session>(vec![], |_| Arc::new(Session) as _);
    let mut config = ServiceConfiguration::new();
    config.per_request = true;
    builder.register_configuration::<Session>(&[], config).unwrap();

    let container = builder.build();
    let resolved = container.resolve::<Session>(&[]);
    assert!(!resolved.is_ok());
    assert!(matches!(resolved.try_instance(), Err(DiError::WrongLifestyle(_))));
    assert!(container.create::<Session>(&[], Default::default()).is_ok());
}

#[test]
fn concurrent_resolves_construct_exactly_once() {
    struct Big;

    let call_count = Arc::new(AtomicUsize::new(0));
    let mut builder = ContainerBuilder::new();
    let counted = call_count.clone();
    builder.register_constructor::<Big>(vec![], move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
        thread::sleep(std::time::Duration::from_millis(20));
        Arc::new(Big) as _
    });
    builder.register_configuration::<Big>(&[], ServiceConfiguration::new()).unwrap();

    let container = Arc::new(builder.build());
    let threads = 32;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.resolve::<Big>(&[]).instance()
            })
        })
        .collect();

    let instances: Vec<Arc<Big>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(call_count.load(Ordering::SeqCst), 1);
    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }
}

#[test]
fn convergent_contract_scoped_requests_construct_exactly_once() {
    // `Widget` is only registered unscoped, so neither `["a"]` nor `["b"]`
    // is ever actually consulted — both requests collapse onto the same
    // `final_name` (spec.md §4.5 steps 10-11), and must share one instance
    // even though their declared contract stacks differ.
    struct Widget;

    let call_count = Arc::new(AtomicUsize::new(0));
    let mut builder = ContainerBuilder::new();
    let counted = call_count.clone();
    builder.register_constructor::<Widget>(vec![], move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
        thread::sleep(std::time::Duration::from_millis(20));
        Arc::new(Widget) as _
    });
    builder.register_configuration::<Widget>(&[], ServiceConfiguration::new()).unwrap();

    let container = Arc::new(builder.build());
    let barrier = Arc::new(Barrier::new(2));

    let c1 = container.clone();
    let b1 = barrier.clone();
    let h1 = thread::spawn(move || {
        b1.wait();
        c1.resolve::<Widget>(&["a"]).instance()
    });

    let c2 = container.clone();
    let b2 = barrier.clone();
    let h2 = thread::spawn(move || {
        b2.wait();
        c2.resolve::<Widget>(&["b"]).instance()
    });

    let first = h1.join().unwrap();
    let second = h2.join().unwrap();

    assert_eq!(call_count.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn build_up_invokes_the_registered_hook_against_an_existing_instance() {
    struct Widget {
        touched: AtomicUsize,
    }

    let mut builder = ContainerBuilder::new();
    let mut config = ServiceConfiguration::new();
    config.build_up_hook = Some(Arc::new(|_container, any| {
        let widget = any.clone().downcast::<Widget>().map_err(|_| DiError::TypeMismatch("Widget"))?;
        widget.touched.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));
    builder.register_configuration::<Widget>(&[], config).unwrap();

    let container = builder.build();
    let target = Arc::new(Widget { touched: AtomicUsize::new(0) });
    container.build_up(&target, &[]).unwrap();

    assert_eq!(target.touched.load(Ordering::SeqCst), 1);
}

#[test]
fn dispose_runs_parents_before_their_dependencies() {
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
    child_config.container_owns_instance = true;
    let child_order = order.clone();
    child_config.dispose_hook = Some(Arc::new(move |_any| {
        child_order.lock().unwrap().push("child");
        Ok(())
    }));
    builder.register_configuration::<Child>(&[], child_config).unwrap();

    let mut parent_config = ServiceConfiguration::new();
    parent_config.container_owns_instance = true;
    let parent_order = order.clone();
    parent_config.dispose_hook = Some(Arc::new(move |_any| {
        parent_order.lock().unwrap().push("parent");
        Ok(())
    }));
    builder.register_configuration::<Parent>(&[], parent_config).unwrap();

    let container = builder.build();
    container.resolve::<Parent>(&[]).instance();
    container.dispose().unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["parent", "child"]);
}

#[test]
fn clone_with_overlay_overrides_fresh_resolutions_but_shares_existing_singletons() {
    struct Shared;
    struct Config {
        value: &'static str,
    }

    let mut builder = ContainerBuilder::new();
    builder.register_constructor::<Shared>(vec![], |_| Arc::new(Shared) as _);
    builder.register_configuration::<Shared>(&[], ServiceConfiguration::new()).unwrap();

    let container = builder.build();
    let base_shared = container.resolve::<Shared>(&[]).instance();

    let mut overlay_builder = ContainerBuilder::new();
    let mut overlay_config = ServiceConfiguration::new();
    overlay_config.factory = Some(Arc::new(|_| Ok(Arc::new(Config { value: "overlay" }) as _)));
    overlay_builder.register_configuration::<Config>(&[], overlay_config).unwrap();

    let clone = container.clone_with(overlay_builder.into_registry());

    // `Config` was never resolved on the base container, so the clone's
    // overlay is the first and only configuration consulted for it.
    assert_eq!(clone.resolve::<Config>(&[]).instance().value, "overlay");

    // `Shared` was already cached on the base container before cloning, and
    // the clone shares that same cache, so it sees the identical instance
    // rather than constructing its own.
    let clone_shared = clone.resolve::<Shared>(&[]).instance();
    assert!(Arc::ptr_eq(&base_shared, &clone_shared));
}
