//! Schema assembly integration tests.

use std::sync::Arc;

use reflectql_reflect::{
    EnumDescriptor, EnumValue, MethodSignature, ObjectDescriptor, ParameterDescriptor,
    PropertyDescriptor, SequenceShape, TypeDescriptor,
};
use reflectql_schema::schema::{FieldLocation, FieldSpec, SchemaDirective};
use reflectql_schema::{
    FieldKind, HandlerEntry, HandlerRegistry, HandlerReturn, HandlerSet, ResolverBinding,
    SchemaAssembler, SchemaConfig, SchemaError, SchemaFragment, handler_fn,
};

struct LibraryResolver;

fn noop(value: serde_json::Value) -> reflectql_schema::handler::HandlerFn {
    handler_fn(move |_: Arc<LibraryResolver>, _| {
        let value = value.clone();
        async move { Ok(HandlerReturn::json(value)) }
    })
}

fn user_type() -> TypeDescriptor {
    TypeDescriptor::Object(Arc::new(
        ObjectDescriptor::new("User")
            .property(PropertyDescriptor::new("id", TypeDescriptor::Id))
            .property(
                PropertyDescriptor::new("name", TypeDescriptor::string())
                    .describe("Display name"),
            )
            .property(PropertyDescriptor::new("posts", post_type().list())),
    ))
}

fn post_type() -> TypeDescriptor {
    TypeDescriptor::Object(Arc::new(
        ObjectDescriptor::new("Post")
            .property(PropertyDescriptor::new("title", TypeDescriptor::string()))
            .property(PropertyDescriptor::new(
                "author",
                TypeDescriptor::lazy(user_type),
            )),
    ))
}

fn status_enum() -> TypeDescriptor {
    TypeDescriptor::Enum(Arc::new(EnumDescriptor::new(
        "Status",
        [("Active", EnumValue::Int(1)), ("Archived", EnumValue::Int(10))],
    )))
}

/// Builds the full fixture schema from scratch; used twice for the
/// idempotence check.
fn assemble_library_schema() -> reflectql_schema::Result<async_graphql::dynamic::Schema> {
    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<LibraryResolver>(
        HandlerSet::new()
            .query(
                HandlerEntry::new(
                    "user",
                    MethodSignature::returning(user_type().nullable().promised())
                        .parameter(ParameterDescriptor::argument("id", TypeDescriptor::Id)),
                    noop(serde_json::json!({ "id": "u1", "name": "Ada", "posts": [] })),
                )
                .describe("Fetch a single user by id"),
            )
            .query(
                HandlerEntry::new(
                    "status",
                    MethodSignature::returning(status_enum()),
                    noop(serde_json::json!(1)),
                )
                .deprecated("use userStatus instead"),
            )
            .mutation(HandlerEntry::new(
                "renameUser",
                MethodSignature::returning(user_type())
                    .parameter(ParameterDescriptor::argument("id", TypeDescriptor::Id))
                    .parameter(
                        ParameterDescriptor::argument("name", TypeDescriptor::string())
                            .default(serde_json::json!("anonymous")),
                    ),
                noop(serde_json::json!({ "id": "u1", "name": "anonymous", "posts": [] })),
            ))
            .subscription(HandlerEntry::new(
                "userCreated",
                MethodSignature::returning(
                    user_type().sequence(SequenceShape::Generator).promised(),
                ),
                noop(serde_json::Value::Null),
            )),
    );

    SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<LibraryResolver>())
        .assemble()
}

#[tokio::test]
async fn assembles_all_three_root_types() {
    let schema = assemble_library_schema().unwrap();
    let sdl = schema.sdl();

    assert!(sdl.contains("type Query"), "missing Query root:\n{sdl}");
    assert!(sdl.contains("type Mutation"), "missing Mutation root:\n{sdl}");
    assert!(
        sdl.contains("type Subscription"),
        "missing Subscription root:\n{sdl}"
    );

    assert!(sdl.contains("user(id: ID!): User"));
    assert!(sdl.contains("userCreated: User!"));

    // The cyclic pair materializes once each, with the back-reference
    // pointing at the registered type.
    assert!(sdl.contains("type User"));
    assert!(sdl.contains("type Post"));
    assert!(sdl.contains("author: User!"));
    assert!(sdl.contains("posts: [Post]!"));

    // Enum members are exposed under their declared names.
    assert!(sdl.contains("enum Status"));
    assert!(sdl.contains("Active"));
    assert!(sdl.contains("Archived"));

    // Deprecations and descriptions survive into the schema.
    assert!(sdl.contains("@deprecated"));
    assert!(sdl.contains("use userStatus instead"));
    assert!(sdl.contains("Fetch a single user by id"));

    // Argument defaults are exposed.
    assert!(sdl.contains("anonymous"));
}

#[tokio::test]
async fn custom_scalars_are_registered() {
    let schema = assemble_library_schema().unwrap();
    let sdl = schema.sdl();

    for scalar in ["Void", "BigInt", "PositiveInt", "UUID", "DateTime", "Byte"] {
        assert!(
            sdl.contains(&format!("scalar {scalar}")),
            "missing scalar {scalar}:\n{sdl}"
        );
    }
}

#[tokio::test]
async fn mutation_root_requires_a_mutation_handler() {
    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<LibraryResolver>(HandlerSet::new().query(
        HandlerEntry::new(
            "ping",
            MethodSignature::returning(TypeDescriptor::string()),
            noop(serde_json::json!("pong")),
        ),
    ));

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<LibraryResolver>())
        .assemble()
        .unwrap();
    let sdl = schema.sdl();

    assert!(!sdl.contains("type Mutation"));
    assert!(!sdl.contains("type Subscription"));
}

#[tokio::test]
async fn empty_query_root_gets_a_placeholder_field() {
    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<LibraryResolver>(HandlerSet::new().mutation(
        HandlerEntry::new(
            "touch",
            MethodSignature::returning(TypeDescriptor::Void),
            noop(serde_json::Value::Null),
        ),
    ));

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<LibraryResolver>())
        .assemble()
        .unwrap();
    let sdl = schema.sdl();

    assert!(sdl.contains("_placeholder"), "no placeholder field:\n{sdl}");
    assert!(sdl.contains("type Mutation"));
}

#[tokio::test]
async fn duplicate_root_fields_across_resolvers_are_rejected() {
    struct FirstResolver;
    struct SecondResolver;

    let ping = |_: Arc<FirstResolver>, _| async { Ok(HandlerReturn::json(serde_json::json!("a"))) };
    let pong =
        |_: Arc<SecondResolver>, _| async { Ok(HandlerReturn::json(serde_json::json!("b"))) };

    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<FirstResolver>(HandlerSet::new().query(HandlerEntry::new(
        "ping",
        MethodSignature::returning(TypeDescriptor::string()),
        handler_fn(ping),
    )));
    handlers.register_handler_set::<SecondResolver>(HandlerSet::new().query(HandlerEntry::new(
        "ping",
        MethodSignature::returning(TypeDescriptor::string()),
        handler_fn(pong),
    )));

    let err = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<FirstResolver>())
        .add_resolver(ResolverBinding::of::<SecondResolver>())
        .assemble()
        .unwrap_err();

    assert!(matches!(
        err,
        SchemaError::DuplicateRootField { root: "Query", ref name } if name == "ping"
    ));
}

#[tokio::test]
async fn assembly_is_structurally_idempotent() {
    let first = assemble_library_schema().unwrap();
    let second = assemble_library_schema().unwrap();
    assert_eq!(first.sdl(), second.sdl());
}

#[tokio::test]
async fn unions_concatenate_member_names_in_sdl() {
    let photo = TypeDescriptor::Object(Arc::new(
        ObjectDescriptor::new("Photo")
            .property(PropertyDescriptor::new("url", TypeDescriptor::string())),
    ));
    let clip = TypeDescriptor::Object(Arc::new(
        ObjectDescriptor::new("Clip")
            .property(PropertyDescriptor::new("duration", TypeDescriptor::integer())),
    ));
    let media = TypeDescriptor::Union(vec![photo, clip]);

    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<LibraryResolver>(HandlerSet::new().query(
        HandlerEntry::new(
            "media",
            MethodSignature::returning(media),
            noop(serde_json::json!({ "url": "x" })),
        ),
    ));

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<LibraryResolver>())
        .assemble()
        .unwrap();
    let sdl = schema.sdl();

    assert!(
        sdl.contains("union PhotoClip = Photo | Clip"),
        "missing union:\n{sdl}"
    );
}

#[tokio::test]
async fn invalid_subscription_return_fails_at_assembly() {
    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<LibraryResolver>(HandlerSet::new().subscription(
        HandlerEntry::new(
            "ticks",
            MethodSignature::returning(TypeDescriptor::string()),
            noop(serde_json::Value::Null),
        ),
    ));

    let err = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<LibraryResolver>())
        .assemble()
        .unwrap_err();

    match err {
        SchemaError::InvalidSubscriptionType { class, method } => {
            assert_eq!(class, "LibraryResolver");
            assert_eq!(method, "ticks");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unregistered_resolver_class_fails_at_assembly() {
    struct GhostResolver;

    let err = SchemaAssembler::new(Arc::new(HandlerRegistry::new()))
        .add_resolver(ResolverBinding::of::<GhostResolver>())
        .assemble()
        .unwrap_err();

    assert!(matches!(
        err,
        SchemaError::MissingHandlerSet(ref class) if class == "GhostResolver"
    ));
}

#[tokio::test]
async fn directive_passes_rewrite_fields_in_registration_order() {
    struct Suffix(&'static str);

    impl SchemaDirective for Suffix {
        fn name(&self) -> &str {
            "suffix"
        }

        fn transform_field(&self, _location: FieldLocation, mut field: FieldSpec) -> FieldSpec {
            field.name = format!("{}{}", field.name, self.0);
            field
        }
    }

    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<LibraryResolver>(HandlerSet::new().query(
        HandlerEntry::new(
            "ping",
            MethodSignature::returning(TypeDescriptor::string()),
            noop(serde_json::json!("pong")),
        ),
    ));

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<LibraryResolver>())
        .add_directive(Arc::new(Suffix("V2")))
        .add_directive(Arc::new(Suffix("Beta")))
        .assemble()
        .unwrap();

    // Each pass sees the previous pass's output.
    assert!(schema.sdl().contains("pingV2Beta"));
}

#[tokio::test]
async fn fragments_merge_and_conflicts_are_rejected() {
    use async_graphql::Value;
    use async_graphql::dynamic::{Field, FieldFuture, Object, TypeRef};

    let external_type = || {
        Object::new("External").field(Field::new(
            "tag",
            TypeRef::named(TypeRef::STRING),
            |_| FieldFuture::new(async { Ok(Some(Value::String("external".to_string()))) }),
        ))
    };

    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<LibraryResolver>(HandlerSet::new().query(
        HandlerEntry::new(
            "ping",
            MethodSignature::returning(TypeDescriptor::string()),
            noop(serde_json::json!("pong")),
        ),
    ));
    let handlers = Arc::new(handlers);

    let mut fragment = SchemaFragment::new();
    fragment.objects.push(external_type());

    let schema = SchemaAssembler::new(handlers.clone())
        .add_resolver(ResolverBinding::of::<LibraryResolver>())
        .merge_fragment(fragment)
        .assemble()
        .unwrap();
    assert!(schema.sdl().contains("type External"));

    // The same type supplied twice is a conflict.
    let mut first = SchemaFragment::new();
    first.objects.push(external_type());
    let mut second = SchemaFragment::new();
    second.objects.push(external_type());

    let err = SchemaAssembler::new(handlers)
        .add_resolver(ResolverBinding::of::<LibraryResolver>())
        .merge_fragment(first)
        .merge_fragment(second)
        .assemble()
        .unwrap_err();
    assert!(matches!(
        err,
        SchemaError::DuplicateFragmentType(ref name) if name == "External"
    ));
}

#[tokio::test]
async fn extra_named_types_are_included() {
    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<LibraryResolver>(HandlerSet::new().query(
        HandlerEntry::new(
            "ping",
            MethodSignature::returning(TypeDescriptor::string()),
            noop(serde_json::json!("pong")),
        ),
    ));

    let audit = TypeDescriptor::Object(Arc::new(
        ObjectDescriptor::new("AuditRecord")
            .property(PropertyDescriptor::new("actor", TypeDescriptor::string())),
    ));

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<LibraryResolver>())
        .add_output_type(audit)
        .assemble()
        .unwrap();

    assert!(schema.sdl().contains("type AuditRecord"));
}

#[tokio::test]
async fn config_limits_are_applied() {
    let mut handlers = HandlerRegistry::new();
    handlers.register_handler_set::<LibraryResolver>(HandlerSet::new().query(
        HandlerEntry::new(
            "ping",
            MethodSignature::returning(TypeDescriptor::string()),
            noop(serde_json::json!("pong")),
        ),
    ));

    let schema = SchemaAssembler::new(Arc::new(handlers))
        .add_resolver(ResolverBinding::of::<LibraryResolver>())
        .with_config(SchemaConfig {
            max_depth: Some(4),
            max_complexity: Some(64),
            introspection: false,
        })
        .assemble();

    assert!(schema.is_ok(), "schema should build with limits configured");
}

#[test]
fn field_kind_labels_are_stable() {
    assert_eq!(FieldKind::Query.as_str(), "query");
    assert_eq!(FieldKind::FieldResolver.as_str(), "field resolver");
}
