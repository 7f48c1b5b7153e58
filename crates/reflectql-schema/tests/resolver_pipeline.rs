//! Resolver pipeline integration tests: argument handling, validation,
//! middleware, and instance resolution through the executable schema.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_graphql::Request;
use reflectql_reflect::{
    MethodSignature, ObjectDescriptor, ParameterDescriptor, PropertyDescriptor, StringDescriptor,
    TypeDescriptor,
};
use reflectql_schema::{
    ExecutionContext, HandlerCall, HandlerEntry, HandlerRegistry, HandlerReturn, HandlerSet,
    ResolverBinding, SchemaAssembler, SimpleInjector, TypeResolvers, handler_fn, middleware_fn,
};

struct GreeterResolver {
    calls: Arc<AtomicUsize>,
}

fn greet_signature() -> MethodSignature {
    MethodSignature::returning(TypeDescriptor::string().promised()).parameter(
        ParameterDescriptor::argument(
            "name",
            TypeDescriptor::String(StringDescriptor {
                min_length: Some(3),
                ..StringDescriptor::default()
            }),
        ),
    )
}

fn greeter_handler() -> reflectql_schema::handler::HandlerFn {
    handler_fn(|resolver: Arc<GreeterResolver>, call: HandlerCall| async move {
        resolver.calls.fetch_add(1, Ordering::SeqCst);
        let name: String = call.argument_as(0)?;
        HandlerReturn::value(format!("Hello, {name}!"))
    })
}

fn context(injector: SimpleInjector) -> ExecutionContext {
    ExecutionContext::builder()
        .with_injector(Arc::new(injector))
        .with_request_id("req-1")
        .build()
        .unwrap()
}

fn greeter_schema(set: HandlerSet) -> async_graphql::dynamic::Schema {
    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<GreeterResolver>(set);
    SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<GreeterResolver>())
        .assemble()
        .unwrap()
}

#[tokio::test]
async fn resolves_a_query_end_to_end() {
    let calls = Arc::new(AtomicUsize::new(0));
    let schema = greeter_schema(
        HandlerSet::new().query(HandlerEntry::new("greet", greet_signature(), greeter_handler())),
    );

    let mut injector = SimpleInjector::new();
    injector.provide(GreeterResolver { calls: calls.clone() });

    let response = schema
        .execute(Request::new(r#"{ greet(name: "Ada") }"#).data(context(injector)))
        .await;

    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        serde_json::json!({ "greet": "Hello, Ada!" })
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn validation_failure_rejects_before_the_handler_runs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let schema = greeter_schema(
        HandlerSet::new().query(HandlerEntry::new("greet", greet_signature(), greeter_handler())),
    );

    let mut injector = SimpleInjector::new();
    injector.provide(GreeterResolver { calls: calls.clone() });

    let response = schema
        .execute(Request::new(r#"{ greet(name: "Ab") }"#).data(context(injector)))
        .await;

    assert_eq!(response.errors.len(), 1, "exactly one error expected");
    let error = &response.errors[0];
    assert!(
        error.message.contains("at least 3"),
        "unexpected message: {}",
        error.message
    );
    assert!(
        error
            .path
            .iter()
            .any(|segment| format!("{segment:?}").contains("greet")),
        "error path should reference the field"
    );
    assert_eq!(
        calls.load(Ordering::SeqCst),
        0,
        "handler must not be invoked on validation failure"
    );
}

#[tokio::test]
async fn middleware_abort_prevents_handler_invocation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let schema = greeter_schema(
        HandlerSet::new().query(
            HandlerEntry::new("greet", greet_signature(), greeter_handler())
                .with_middleware(middleware_fn(|_, next| next.abort("not allowed"))),
        ),
    );

    let mut injector = SimpleInjector::new();
    injector.provide(GreeterResolver { calls: calls.clone() });

    let response = schema
        .execute(Request::new(r#"{ greet(name: "Ada") }"#).data(context(injector)))
        .await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "not allowed");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn class_middleware_runs_before_field_middleware() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));

    let class_mw = {
        let order = order.clone();
        middleware_fn(move |_, next| {
            order.lock().unwrap().push("class");
            next.proceed();
        })
    };
    let field_mw = {
        let order = order.clone();
        middleware_fn(move |_, next| {
            order.lock().unwrap().push("field");
            next.proceed();
        })
    };

    let schema = greeter_schema(
        HandlerSet::new()
            .with_middleware(class_mw)
            .query(
                HandlerEntry::new("greet", greet_signature(), greeter_handler())
                    .with_middleware(field_mw),
            ),
    );

    let mut injector = SimpleInjector::new();
    injector.provide(GreeterResolver { calls: calls.clone() });

    let response = schema
        .execute(Request::new(r#"{ greet(name: "Ada") }"#).data(context(injector)))
        .await;

    assert!(response.errors.is_empty());
    assert_eq!(*order.lock().unwrap(), vec!["class", "field"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_instance_fails_the_field_only() {
    let schema = greeter_schema(
        HandlerSet::new().query(HandlerEntry::new("greet", greet_signature(), greeter_handler())),
    );

    // Injector with no registered GreeterResolver.
    let response = schema
        .execute(Request::new(r#"{ greet(name: "Ada") }"#).data(context(SimpleInjector::new())))
        .await;

    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].message.contains("GreeterResolver"));
}

#[tokio::test]
async fn default_argument_values_reach_the_handler() {
    struct PagerResolver;

    let handler = handler_fn(|_: Arc<PagerResolver>, call: HandlerCall| async move {
        let limit: i64 = call.argument_as(0)?;
        HandlerReturn::value(limit)
    });

    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<PagerResolver>(HandlerSet::new().query(HandlerEntry::new(
        "pageSize",
        MethodSignature::returning(TypeDescriptor::integer()).parameter(
            ParameterDescriptor::argument("limit", TypeDescriptor::integer())
                .default(serde_json::json!(25)),
        ),
        handler,
    )));

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<PagerResolver>())
        .assemble()
        .unwrap();

    let mut injector = SimpleInjector::new();
    injector.provide(PagerResolver);

    let response = schema
        .execute(Request::new("{ pageSize }").data(context(injector)))
        .await;

    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        serde_json::json!({ "pageSize": 25 })
    );
}

#[tokio::test]
async fn field_resolvers_receive_parent_and_context() {
    struct UserResolver {
        seen_request: Arc<Mutex<Option<String>>>,
    }

    fn user_type() -> TypeDescriptor {
        TypeDescriptor::Object(Arc::new(
            ObjectDescriptor::new("User")
                .property(PropertyDescriptor::new("id", TypeDescriptor::Id))
                .property(PropertyDescriptor::new(
                    "posts",
                    TypeDescriptor::string().list(),
                )),
        ))
    }

    let seen_request = Arc::new(Mutex::new(None));

    let user_handler = handler_fn(|_: Arc<UserResolver>, _| async move {
        Ok(HandlerReturn::json(serde_json::json!({ "id": "u7" })))
    });

    let posts_handler = handler_fn(|resolver: Arc<UserResolver>, call: HandlerCall| async move {
        let parent = call.parent().cloned().unwrap_or_default();
        let context = call.context().expect("context must be spliced in");
        *resolver.seen_request.lock().unwrap() = Some(context.request_id.clone());
        let id = parent["id"].as_str().unwrap_or("unknown").to_string();
        HandlerReturn::value(vec![format!("post-of-{id}")])
    });

    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<UserResolver>(
        HandlerSet::new()
            .query(HandlerEntry::new(
                "user",
                MethodSignature::returning(user_type()),
                user_handler,
            ))
            .field_resolver(
                HandlerEntry::new(
                    "resolve_posts",
                    MethodSignature::returning(TypeDescriptor::string().list())
                        .parameter(ParameterDescriptor::parent("user", TypeDescriptor::Void))
                        .parameter(ParameterDescriptor::context("ctx")),
                    posts_handler,
                )
                .named("posts"),
            ),
    );

    let mut type_resolvers = TypeResolvers::new();
    type_resolvers.bind::<UserResolver>("User");

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<UserResolver>())
        .with_type_resolvers(type_resolvers)
        .assemble()
        .unwrap();

    let mut injector = SimpleInjector::new();
    injector.provide(UserResolver {
        seen_request: seen_request.clone(),
    });

    let response = schema
        .execute(Request::new("{ user { id posts } }").data(context(injector)))
        .await;

    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        serde_json::json!({ "user": { "id": "u7", "posts": ["post-of-u7"] } })
    );
    assert_eq!(seen_request.lock().unwrap().as_deref(), Some("req-1"));
}

#[tokio::test]
async fn mutations_execute_through_the_same_pipeline() {
    struct CounterResolver {
        count: AtomicUsize,
    }

    let handler = handler_fn(|resolver: Arc<CounterResolver>, _| async move {
        let next = resolver.count.fetch_add(1, Ordering::SeqCst) + 1;
        HandlerReturn::value(next as i64)
    });

    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<CounterResolver>(HandlerSet::new().mutation(
        HandlerEntry::new(
            "increment",
            MethodSignature::returning(TypeDescriptor::integer().promised()),
            handler,
        ),
    ));

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<CounterResolver>())
        .assemble()
        .unwrap();

    let mut injector = SimpleInjector::new();
    injector.provide(CounterResolver {
        count: AtomicUsize::new(0),
    });
    let context = context(injector);

    let response = schema
        .execute(Request::new("mutation { increment }").data(context.clone()))
        .await;
    assert_eq!(
        response.data.into_json().unwrap(),
        serde_json::json!({ "increment": 1 })
    );

    let response = schema
        .execute(Request::new("mutation { increment }").data(context))
        .await;
    assert_eq!(
        response.data.into_json().unwrap(),
        serde_json::json!({ "increment": 2 })
    );
}

#[tokio::test]
async fn missing_execution_context_is_a_scoped_error() {
    let schema = greeter_schema(
        HandlerSet::new().query(HandlerEntry::new("greet", greet_signature(), greeter_handler())),
    );

    let response = schema
        .execute(Request::new(r#"{ greet(name: "Ada") }"#))
        .await;

    assert_eq!(response.errors.len(), 1);
    assert!(
        response.errors[0]
            .message
            .contains("execution context not available")
    );
}
