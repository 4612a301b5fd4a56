//! Property-based tests for the universal resolution invariants.

use proptest::prelude::*;
use reflective_di::{ContainerBuilder, ServiceConfiguration};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Debug)]
struct Tagged {
    value: String,
}

proptest! {
    #[test]
    fn singleton_resolution_consistency(value in "\\PC{0,40}") {
        let mut builder = ContainerBuilder::new();
        let captured = value.clone();
        builder.register_constructor::<Tagged>(vec![], move |_| {
            Arc::new(Tagged { value: captured.clone() }) as _
        });
        builder.register_configuration::<Tagged>(&[], ServiceConfiguration::new()).unwrap();

        let container = builder.build();
        let first = container.resolve::<Tagged>(&[]).instance();
        let second = container.resolve::<Tagged>(&[]).instance();
        let third = container.resolve::<Tagged>(&[]).instance();

        prop_assert!(Arc::ptr_eq(&first, &second));
        prop_assert!(Arc::ptr_eq(&second, &third));
        prop_assert_eq!(&first.value, &value);
    }
}

proptest! {
    #[test]
    fn convergent_contract_requests_construct_exactly_once(
        contract_count in 1usize..6,
    ) {
        // Widget is registered unscoped, so every contract stack below
        // collapses onto the same final identity regardless of how many
        // distinct declared contract stacks request it concurrently.
        struct Widget;

        let call_count = Arc::new(AtomicUsize::new(0));
        let mut builder = ContainerBuilder::new();
        let counted = call_count.clone();
        builder.register_constructor::<Widget>(vec![], move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(5));
            Arc::new(Widget) as _
        });
        builder.register_configuration::<Widget>(&[], ServiceConfiguration::new()).unwrap();

        let container = Arc::new(builder.build());
        let barrier = Arc::new(Barrier::new(contract_count));
        let contract_names: Vec<String> = (0..contract_count).map(|i| format!("contract-{i}")).collect();

        let handles: Vec<_> = contract_names
            .into_iter()
            .map(|name| {
                let container = container.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    container.resolve::<Widget>(&[&name]).instance()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        prop_assert_eq!(call_count.load(Ordering::SeqCst), 1);
        for window in results.windows(2) {
            prop_assert!(Arc::ptr_eq(&window[0], &window[1]));
        }
    }
}

proptest! {
    #[test]
    fn trait_resolution_consistency(id in 1u32..10_000) {
        trait Labeled: Send + Sync {
            fn id(&self) -> u32;
        }

        struct LabeledImpl(u32);
        impl Labeled for LabeledImpl {
            fn id(&self) -> u32 {
                self.0
            }
        }

        let mut builder = ContainerBuilder::new();
        builder.register_constructor::<LabeledImpl>(vec![], move |_| Arc::new(LabeledImpl(id)) as _);
        builder.register_configuration::<LabeledImpl>(&[], ServiceConfiguration::new()).unwrap();
        builder.register_interface::<dyn Labeled, LabeledImpl>(|impl_arc| impl_arc as Arc<dyn Labeled>);

        let container = builder.build();
        let first = container.resolve_trait::<dyn Labeled>(&[]).instance();
        let second = container.resolve_trait::<dyn Labeled>(&[]).instance();

        prop_assert!(Arc::ptr_eq(&first, &second));
        prop_assert_eq!(first.id(), id);
    }
}
