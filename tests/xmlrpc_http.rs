// tests/xmlrpc_http.rs
use release_herald::index::xmlrpc::XmlRpcIndex;
use release_herald::index::{PackageIndex, ReleaseSource};
use release_herald::Error;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn response(value: &str) -> ResponseTemplate {
    let body = format!(
        "<?xml version='1.0'?><methodResponse><params><param>{value}</param></params></methodResponse>"
    );
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/xml")
        .set_body_string(body)
}

fn s(v: &str) -> String {
    format!("<value><string>{v}</string></value>")
}

fn array(items: &[String]) -> String {
    format!("<value><array><data>{}</data></array></value>", items.concat())
}

async fn index_on(server: &MockServer) -> XmlRpcIndex {
    XmlRpcIndex::new(format!("{}/pypi", server.uri()))
}

#[tokio::test]
async fn changelog_sends_since_and_decodes_rows() {
    let server = MockServer::start().await;
    let rows = array(&[
        array(&[s("vimeo"), s("0.1.2"), "<value><int>1344087619</int></value>".into(), s("update description, classifiers")]),
        array(&[s("broken")]),
    ]);
    Mock::given(method("POST"))
        .and(path("/pypi"))
        .and(body_string_contains("<methodName>changelog</methodName>"))
        .and(body_string_contains("<int>1344087500</int>"))
        .respond_with(response(&rows))
        .expect(1)
        .mount(&server)
        .await;

    let evs = index_on(&server).await.changelog(1_344_087_500).await.unwrap();

    assert_eq!(evs.len(), 1);
    assert_eq!(evs[0].name, "vimeo");
    assert!(evs[0].is_update());
}

#[tokio::test]
async fn empty_release_data_means_no_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("<methodName>release_data</methodName>"))
        .respond_with(response("<value><struct></struct></value>"))
        .mount(&server)
        .await;

    let out = index_on(&server).await.release_data("nope", "1.0").await.unwrap();
    assert!(out.is_none());
}

#[tokio::test]
async fn release_data_decodes_metadata() {
    let server = MockServer::start().await;
    let body = format!(
        "<value><struct>\
           <member><name>summary</name>{}</member>\
           <member><name>home_page</name>{}</member>\
           <member><name>classifiers</name>{}</member>\
         </struct></value>",
        s("HTTP for humans"),
        s("UNKNOWN"),
        array(&[s("Programming Language :: Python :: 3")])
    );
    Mock::given(method("POST"))
        .and(body_string_contains("<string>requests</string>"))
        .respond_with(response(&body))
        .mount(&server)
        .await;

    let m = index_on(&server)
        .await
        .release_data("requests", "2.0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(m.summary(), Some("HTTP for humans"));
    assert_eq!(m.home_page(), None);
    assert!(m.classifiers.contains("Programming Language :: Python :: 3"));
}

#[tokio::test]
async fn browse_each_batches_into_one_multicall() {
    let server = MockServer::start().await;
    let hit = |n: &str| array(&[s(n), s("1.0")]);
    let body = array(&[
        array(&[array(&[hit("x"), hit("y")])]),
        array(&[array(&[hit("y"), hit("z")])]),
    ]);
    Mock::given(method("POST"))
        .and(body_string_contains("<methodName>system.multicall</methodName>"))
        .and(body_string_contains("<string>A</string>"))
        .and(body_string_contains("<string>B</string>"))
        .respond_with(response(&body))
        .expect(1)
        .mount(&server)
        .await;

    let out = index_on(&server)
        .await
        .browse_each(&["A".to_string(), "B".to_string()])
        .await
        .unwrap();
    assert_eq!(out, vec![vec!["x", "y"], vec!["y", "z"]]);
}

#[tokio::test]
async fn fault_is_reported() {
    let server = MockServer::start().await;
    let body = "<?xml version='1.0'?><methodResponse><fault><value><struct>\
        <member><name>faultCode</name><value><int>-32500</int></value></member>\
        <member><name>faultString</name><value><string>server busy</string></value></member>\
        </struct></value></fault></methodResponse>";
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let err = index_on(&server).await.package_releases("x").await.unwrap_err();
    assert!(matches!(err, Error::Fault { code: -32500, .. }), "got {err:?}");
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = index_on(&server).await.changelog(0).await.unwrap_err();
    assert!(err.is_transient());
}
