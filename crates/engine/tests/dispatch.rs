use std::sync::{Arc, Mutex};

use opcall_engine::{DispatchError, Dispatcher};
use opcall_registry::{
    ApiResponse, ArgDescriptor, BuilderSignature, CallContext, CallError, CapabilitySurface, ConfigurableRequest, Namespace, Operation,
    Returns, Shape, StructField, StructShape, TransportResponse, TypedValue, WAIT_FOR_REQUEST,
};
use opcall_types::{InputEnvelope, decode_input, encode_output};
use serde_json::{Value, json};

type CallLog = Arc<Mutex<Vec<String>>>;

/// Request that records builder calls and echoes its configuration as the result.
struct EchoRequest {
    operation: String,
    arguments: Vec<TypedValue>,
    configured: Vec<(String, Vec<TypedValue>)>,
    builders: Vec<BuilderSignature>,
    log: CallLog,
}

impl ConfigurableRequest for EchoRequest {
    fn builder(&self, name: &str) -> Option<&BuilderSignature> {
        self.builders.iter().find(|signature| signature.name == name)
    }

    fn configure(mut self: Box<Self>, method: &str, arguments: Vec<TypedValue>) -> Result<Box<dyn ConfigurableRequest>, CallError> {
        self.log.lock().expect("log").push(method.to_string());
        self.configured.push((method.to_string(), arguments));
        Ok(self)
    }

    fn execute(self: Box<Self>) -> Returns {
        let response = TransportResponse::new(200)
            .with_header("Content-Type", "application/json")
            .with_payload(b"{}".to_vec());
        let configured: Vec<Value> = self
            .configured
            .iter()
            .map(|(method, arguments)| json!({"method": method, "arguments": arguments.iter().map(TypedValue::to_json).collect::<Vec<_>>()}))
            .collect();
        let result = json!({
            "operation": self.operation,
            "arguments": self.arguments.iter().map(TypedValue::to_json).collect::<Vec<_>>(),
            "configured": configured,
        });
        Returns::with_result(Some(TypedValue::Json(result)), Some(ApiResponse::with_response(self.operation, response)), None)
    }
}

fn builder_operation(name: &str, args: Vec<ArgDescriptor>, log: &CallLog) -> Operation {
    let log = Arc::clone(log);
    Operation::builder(name, args, move |context: &CallContext, arguments| {
        Ok(Box::new(EchoRequest {
            operation: context.operation.clone(),
            arguments,
            configured: Vec::new(),
            builders: vec![
                BuilderSignature::new("Depth", vec![Shape::int32()]),
                BuilderSignature::new("Filter", vec![Shape::string(), Shape::string()]),
            ],
            log: Arc::clone(&log),
        }) as Box<dyn ConfigurableRequest>)
    })
}

fn surface(log: &CallLog) -> CapabilitySurface {
    let properties = StructShape::new(
        "DatacenterProperties",
        vec![
            StructField::required("name", Shape::string()),
            StructField::required("location", Shape::string()),
            StructField::optional("createdDate", Shape::Timestamp),
        ],
    );
    let datacenter = StructShape::new("Datacenter", vec![StructField::required("properties", Shape::structure(properties))]);

    let delete = Operation::builder(
        "DatacentersDelete",
        vec![ArgDescriptor::required("datacenterId", Shape::string())],
        |_, _| {
            struct Delete;
            impl ConfigurableRequest for Delete {
                fn builder(&self, _: &str) -> Option<&BuilderSignature> {
                    None
                }
                fn configure(self: Box<Self>, method: &str, _: Vec<TypedValue>) -> Result<Box<dyn ConfigurableRequest>, CallError> {
                    Err(CallError::failed(format!("unexpected builder {method}")))
                }
                fn execute(self: Box<Self>) -> Returns {
                    let response = TransportResponse::new(404).with_header("X-Request-Id", "r-1").with_payload(b"not found".to_vec());
                    Returns::metadata_only(
                        Some(ApiResponse::with_response("DatacentersDelete", response)),
                        Some(CallError::api("404 Not Found", "not found")),
                    )
                }
            }
            Ok(Box::new(Delete) as Box<dyn ConfigurableRequest>)
        },
    );

    let wait = Operation::direct(WAIT_FOR_REQUEST, vec![ArgDescriptor::required("request", Shape::string())], |_, arguments| {
        let done = arguments.first().and_then(TypedValue::as_str) == Some("https://api.example.com/requests/abc/status");
        let response = TransportResponse::new(200).with_header("ETag", "\"1\"");
        let error = if done { None } else { Some(CallError::failed("request failed")) };
        Returns::metadata_only(Some(ApiResponse::with_response(WAIT_FOR_REQUEST, response)), error)
    });

    CapabilitySurface::new()
        .with_client_operation(wait)
        .with_namespace(
            Namespace::new("DataCentersApi")
                .with_operation(builder_operation("DatacentersGet", vec![], log))
                .with_operation(builder_operation(
                    "DatacentersFindById",
                    vec![
                        ArgDescriptor::required("datacenterId", Shape::string()),
                        ArgDescriptor::optional("depth", Shape::int32()),
                    ],
                    log,
                ))
                .with_operation(builder_operation(
                    "DatacentersPost",
                    vec![ArgDescriptor::required("datacenter", Shape::structure(datacenter))],
                    log,
                ))
                .with_operation(delete),
        )
        .with_namespace(Namespace::new("ShadowApi").with_operation(builder_operation("DatacentersGet", vec![], log)))
}

fn dispatch(text: &str) -> (opcall_types::OutputEnvelope, Vec<String>) {
    let log = CallLog::default();
    let surface = surface(&log);
    let input = decode_input(text).expect("decode input");
    let output = Dispatcher::new(&surface).dispatch(input);
    let calls = log.lock().expect("log").clone();
    (output, calls)
}

#[test]
fn unknown_operation_reports_not_found_envelope() {
    let (output, _) = dispatch(r#"{"operation":"unknownThing","params":[]}"#);
    let encoded: Value = serde_json::from_str(&encode_output(&output).expect("encode")).expect("json");
    assert_eq!(
        encoded,
        json!({
            "error": {"message": "operation unknownThing not found"},
            "httpResponse": {"statusCode": 0, "headers": {}, "body": ""},
            "result": null
        })
    );
}

#[test]
fn lower_case_operation_succeeds_with_result() {
    let (output, _) = dispatch(r#"{"operation":"datacentersGet","params":[]}"#);
    assert!(output.error.is_none());
    let result = output.result.expect("result");
    assert_eq!(result["operation"], json!("DatacentersGet"));
    assert_eq!(output.http_response.status_code, 200);
    assert_eq!(output.http_response.headers["content-type"], vec!["application/json".to_string()]);
}

#[test]
fn too_few_params_cites_supplied_and_required_counts() {
    let (output, _) = dispatch(r#"{"operation":"datacentersFindById","params":[]}"#);
    let message = output.error.expect("error").message;
    assert_eq!(message, "operation DatacentersFindById: too few params; found 0, expected 1");
    assert!(output.result.is_none());
}

#[test]
fn float_positional_param_truncates_into_int32() {
    let (output, _) = dispatch(r#"{"operation":"datacentersFindById","params":[{"name":"datacenterId","value":"dc-1"},{"name":"depth","value":3.7}]}"#);
    let result = output.result.expect("result");
    assert_eq!(result["arguments"], json!(["dc-1", 3]));
}

#[test]
fn excess_params_are_replayed_through_builders() {
    let (output, calls) = dispatch(
        r#"{"operation":"datacentersGet","params":[{"name":"depth","value":2},{"name":"filters","value":{"a":"x","b":"y"}}]}"#,
    );
    assert!(output.error.is_none(), "unexpected error: {:?}", output.error);
    assert_eq!(calls, vec!["Depth", "Filter", "Filter"]);
    let result = output.result.expect("result");
    assert_eq!(
        result["configured"],
        json!([
            {"method": "Depth", "arguments": [2]},
            {"method": "Filter", "arguments": ["a", "x"]},
            {"method": "Filter", "arguments": ["b", "y"]}
        ])
    );
}

#[test]
fn unknown_named_param_is_reported() {
    let (output, calls) = dispatch(r#"{"operation":"datacentersGet","params":[{"name":"orderBy","value":"name"}]}"#);
    assert_eq!(output.error.expect("error").message, "operation DatacentersGet: unknown parameter orderBy");
    assert!(calls.is_empty());
}

#[test]
fn struct_param_with_timestamp_round_trips_into_result() {
    let (output, _) = dispatch(
        r#"{"operation":"datacentersPost","params":[{"name":"datacenter","value":{"properties":{"name":"dc","location":"de/fra","createdDate":"2024-03-01T10:00:00.250+02:00"}}}]}"#,
    );
    let result = output.result.expect("result");
    assert_eq!(
        result["arguments"][0],
        json!({"properties": {"name": "dc", "location": "de/fra", "createdDate": "2024-03-01T08:00:00.250Z"}})
    );
}

#[test]
fn coercion_failure_names_parameter_index() {
    let (output, _) = dispatch(r#"{"operation":"datacentersPost","params":[{"name":"datacenter","value":"dc"}]}"#);
    assert_eq!(
        output.error.expect("error").message,
        "operation DatacentersPost: param #0: invalid parameter type: expected struct Datacenter, got string"
    );
}

#[test]
fn api_error_attaches_http_context() {
    let (output, _) = dispatch(r#"{"operation":"DatacentersDelete","params":[{"name":"datacenterId","value":"dc-1"}]}"#);
    let error = output.error.expect("error");
    assert_eq!(error.message, "404 Not Found: not found");
    let api_response = error.api_response.expect("api response");
    assert_eq!(api_response.status_code, 404);
    assert_eq!(api_response.headers["x-request-id"], vec!["r-1".to_string()]);
    assert!(output.result.is_none());
}

#[test]
fn wait_for_request_uses_direct_path_with_lower_cased_headers() {
    let (output, calls) = dispatch(
        r#"{"operation":"waitForRequest","params":[{"name":"request","value":"https://api.example.com/requests/abc/status"}]}"#,
    );
    assert!(output.error.is_none());
    assert!(output.result.is_none());
    assert!(calls.is_empty());
    assert_eq!(output.http_response.headers["etag"], vec!["\"1\"".to_string()]);
}

#[test]
fn wait_for_request_rejects_extra_params() {
    let (output, _) = dispatch(
        r#"{"operation":"WaitForRequest","params":[{"name":"request","value":"x"},{"name":"depth","value":1}]}"#,
    );
    assert_eq!(output.error.expect("error").message, "operation WaitForRequest: unknown parameter depth");
}

#[test]
fn read_only_dispatch_is_idempotent() {
    let text = r#"{"operation":"datacentersFindById","params":[{"name":"datacenterId","value":"dc-1"},{"name":"filters","value":{"state":"AVAILABLE"}}]}"#;
    let (first, _) = dispatch(text);
    let (second, _) = dispatch(text);
    assert_eq!(first, second);
    assert_eq!(encode_output(&first).expect("encode"), encode_output(&second).expect("encode"));
}

#[test]
fn dispatch_errors_exit_zero() {
    let log = CallLog::default();
    let surface = surface(&log);
    let input = InputEnvelope {
        operation: "nothingHere".into(),
        ..InputEnvelope::default()
    };
    let error = Dispatcher::new(&surface).try_dispatch(input).expect_err("not found");
    assert!(matches!(error, DispatchError::OperationNotFound { .. }));
    assert_eq!(error.exit_status(), 0);
}

#[test]
fn direct_operation_returning_three_values_is_malformed() {
    let wait = Operation::direct(WAIT_FOR_REQUEST, vec![ArgDescriptor::required("request", Shape::string())], |_, _| {
        let response = TransportResponse::new(200);
        Returns::with_result(
            Some(TypedValue::Json(json!({"status": "DONE"}))),
            Some(ApiResponse::with_response(WAIT_FOR_REQUEST, response)),
            None,
        )
    });
    let surface = CapabilitySurface::new().with_client_operation(wait);
    let input = decode_input(r#"{"operation":"waitForRequest","params":[{"name":"request","value":"/requests/abc/status"}]}"#)
        .expect("decode input");

    let output = Dispatcher::new(&surface).dispatch(input);
    assert_eq!(
        output.error.expect("error").message,
        "operation WaitForRequest: malformed call contract: direct operation returned 3 values, expected 2"
    );
    assert!(output.result.is_none());
    assert_eq!(output.http_response.status_code, 0);
}

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLog {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Stages logged while dispatching `text`, in order.
fn dispatch_stages(text: &str) -> Vec<String> {
    let captured = CapturedLog::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let _ = dispatch(text);
    });

    let bytes = captured.0.lock().expect("log buffer").clone();
    String::from_utf8(bytes)
        .expect("utf-8 log")
        .lines()
        .filter(|line| line.contains("dispatch stage"))
        .filter_map(|line| line.rsplit_once("stage=").map(|(_, stage)| stage.trim().to_string()))
        .collect()
}

#[test]
fn successful_dispatch_walks_every_stage_to_encoded() {
    let stages = dispatch_stages(r#"{"operation":"datacentersGet","params":[{"name":"depth","value":1}]}"#);
    assert_eq!(stages, vec!["decoded", "located", "bound", "configured", "executed", "encoded"]);
}

#[test]
fn failed_dispatch_ends_in_failed_stage() {
    let stages = dispatch_stages(r#"{"operation":"datacentersFindById","params":[]}"#);
    assert_eq!(stages, vec!["decoded", "located", "failed"]);

    let stages = dispatch_stages(r#"{"operation":"unknownThing","params":[]}"#);
    assert_eq!(stages, vec!["decoded", "failed"]);
}

#[test]
fn wait_path_skips_the_configured_stage() {
    let stages = dispatch_stages(r#"{"operation":"WaitForRequest","params":[{"name":"request","value":"https://api.example.com/requests/abc/status"}]}"#);
    assert_eq!(stages, vec!["decoded", "located", "bound", "executed", "encoded"]);
}
