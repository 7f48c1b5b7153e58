//! Subscription integration tests: the four production shapes, item
//! serialization, and consumer-driven cancellation.

use std::sync::Arc;
use std::time::Duration;

use async_graphql::Request;
use futures_util::StreamExt;
use reflectql_reflect::{
    EnumDescriptor, EnumValue, MethodSignature, ParameterDescriptor, SequenceShape, TypeDescriptor,
};
use reflectql_schema::{
    EventChannel, ExecutionContext, HandlerCall, HandlerEntry, HandlerRegistry, HandlerReturn,
    HandlerSet, ResolverBinding, SchemaAssembler, SimpleInjector, handler_fn,
};

fn context(injector: SimpleInjector) -> ExecutionContext {
    ExecutionContext::builder()
        .with_injector(Arc::new(injector))
        .with_request_id("req-sub")
        .build()
        .unwrap()
}

#[tokio::test]
async fn async_generator_items_arrive_in_order() {
    struct CounterResolver;

    let handler = handler_fn(|_: Arc<CounterResolver>, _| async {
        Ok(HandlerReturn::stream(futures_util::stream::iter(
            (1..=3).map(|i| Ok(serde_json::json!(i))),
        )))
    });

    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<CounterResolver>(HandlerSet::new().subscription(
        HandlerEntry::new(
            "counter",
            MethodSignature::returning(
                TypeDescriptor::integer().sequence(SequenceShape::Generator).promised(),
            ),
            handler,
        ),
    ));

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<CounterResolver>())
        .assemble()
        .unwrap();

    let mut injector = SimpleInjector::new();
    injector.provide(CounterResolver);

    let mut stream = schema.execute_stream(
        Request::new("subscription { counter }").data(context(injector)),
    );

    for expected in 1..=3 {
        let response = stream.next().await.expect("stream ended early");
        assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            serde_json::json!({ "counter": expected })
        );
    }
    assert!(stream.next().await.is_none(), "stream must end with the source");
}

#[tokio::test]
async fn event_channel_delivers_published_items_and_releases_on_drop() {
    struct OrderResolver {
        channel: Arc<EventChannel>,
    }

    let channel = EventChannel::shared("orders");

    let handler = handler_fn(|resolver: Arc<OrderResolver>, _: HandlerCall| async move {
        Ok(HandlerReturn::channel(resolver.channel.clone()))
    });

    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<OrderResolver>(HandlerSet::new().subscription(
        HandlerEntry::new(
            "orderPlaced",
            MethodSignature::returning(
                TypeDescriptor::integer().sequence(SequenceShape::Channel),
            ),
            handler,
        ),
    ));

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<OrderResolver>())
        .assemble()
        .unwrap();

    let mut injector = SimpleInjector::new();
    injector.provide(OrderResolver {
        channel: channel.clone(),
    });

    let mut stream = schema.execute_stream(
        Request::new("subscription { orderPlaced }").data(context(injector)),
    );

    // Publish once the subscription has attached to the channel.
    let publisher = {
        let channel = channel.clone();
        tokio::spawn(async move {
            while channel.subscriber_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            channel.publish(serde_json::json!(42));
        })
    };

    let response = stream.next().await.expect("no item delivered");
    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        serde_json::json!({ "orderPlaced": 42 })
    );
    publisher.await.unwrap();

    // Ceasing consumption releases the channel subscription.
    assert_eq!(channel.subscriber_count(), 1);
    drop(stream);
    assert_eq!(channel.subscriber_count(), 0);

    // Nothing is listening anymore.
    assert_eq!(channel.publish(serde_json::json!(43)), 0);
}

#[tokio::test]
async fn items_pass_through_the_per_item_serializer() {
    struct StatusResolver;

    let status = Arc::new(EnumDescriptor::new(
        "Status",
        [("Active", EnumValue::Int(1)), ("Archived", EnumValue::Int(10))],
    ));

    // The handler emits declared enum values; consumers see names.
    let handler = handler_fn(|_: Arc<StatusResolver>, _| async {
        Ok(HandlerReturn::stream(futures_util::stream::iter(vec![
            Ok(serde_json::json!(10)),
            Ok(serde_json::json!(1)),
        ])))
    });

    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<StatusResolver>(HandlerSet::new().subscription(
        HandlerEntry::new(
            "statusChanged",
            MethodSignature::returning(
                TypeDescriptor::Enum(status).sequence(SequenceShape::Iterable),
            ),
            handler,
        ),
    ));

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<StatusResolver>())
        .assemble()
        .unwrap();

    let mut injector = SimpleInjector::new();
    injector.provide(StatusResolver);

    let mut stream = schema.execute_stream(
        Request::new("subscription { statusChanged }").data(context(injector)),
    );

    let response = stream.next().await.unwrap();
    assert_eq!(
        response.data.into_json().unwrap(),
        serde_json::json!({ "statusChanged": "Archived" })
    );
    let response = stream.next().await.unwrap();
    assert_eq!(
        response.data.into_json().unwrap(),
        serde_json::json!({ "statusChanged": "Active" })
    );
}

#[tokio::test]
async fn subscription_arguments_are_validated_like_any_field() {
    struct FilteredResolver;

    let handler = handler_fn(|_: Arc<FilteredResolver>, call: HandlerCall| async move {
        let topic: String = call.argument_as(0)?;
        Ok(HandlerReturn::stream(futures_util::stream::iter(vec![Ok(
            serde_json::json!(topic),
        )])))
    });

    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<FilteredResolver>(HandlerSet::new().subscription(
        HandlerEntry::new(
            "topicEvents",
            MethodSignature::returning(
                TypeDescriptor::string().sequence(SequenceShape::Generator),
            )
            .parameter(ParameterDescriptor::argument("topic", TypeDescriptor::string())),
            handler,
        ),
    ));

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<FilteredResolver>())
        .assemble()
        .unwrap();

    let mut injector = SimpleInjector::new();
    injector.provide(FilteredResolver);

    let mut stream = schema.execute_stream(
        Request::new(r#"subscription { topicEvents(topic: "orders") }"#).data(context(injector)),
    );

    let response = stream.next().await.unwrap();
    assert!(response.errors.is_empty());
    assert_eq!(
        response.data.into_json().unwrap(),
        serde_json::json!({ "topicEvents": "orders" })
    );
}

#[tokio::test]
async fn runtime_shape_mismatch_surfaces_a_field_error() {
    struct BrokenResolver;

    // Declared as a generator, but the handler settles to a plain
    // value at runtime.
    let handler = handler_fn(|_: Arc<BrokenResolver>, _| async {
        Ok(HandlerReturn::json(serde_json::json!("not a stream")))
    });

    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<BrokenResolver>(HandlerSet::new().subscription(
        HandlerEntry::new(
            "broken",
            MethodSignature::returning(
                TypeDescriptor::string().sequence(SequenceShape::Generator).promised(),
            ),
            handler,
        ),
    ));

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<BrokenResolver>())
        .assemble()
        .unwrap();

    let mut injector = SimpleInjector::new();
    injector.provide(BrokenResolver);

    let mut stream = schema.execute_stream(
        Request::new("subscription { broken }").data(context(injector)),
    );

    let response = stream.next().await.expect("an error response is expected");
    assert_eq!(response.errors.len(), 1);
    let message = &response.errors[0].message;
    assert!(message.contains("BrokenResolver"), "message: {message}");
    assert!(message.contains("broken"), "message: {message}");
    assert!(stream.next().await.is_none());
}
