use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use webchain::{
    form::{parse_form, parse_multipart, MultipartForm, Values},
    Request,
};

fn request_parse_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_parse");

    let requests = [
        ("get", "GET /ping HTTP/1.1\r\nHost: localhost\r\n\r\n".to_string()),
        (
            "get_with_query",
            "GET /ping?name=John&tag=a&tag=b HTTP/1.1\r\nHost: localhost\r\nUser-Agent: Test\r\n\r\n".to_string(),
        ),
        (
            "post_urlencoded",
            "POST /login HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 29\r\n\r\naccount=admin&password=123456".to_string(),
        ),
        (
            "long_path",
            format!("GET /{} HTTP/1.1\r\nHost: localhost\r\n\r\n", "segment/".repeat(32)),
        ),
    ];

    for (name, request) in requests.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), request, |b, request| {
            b.iter(|| {
                let _ = Request::try_from(black_box(request.as_bytes()), 0).unwrap();
            });
        });
    }

    group.finish();
}

fn form_parse_benchmark(c: &mut Criterion) {
    let urlencoded = Request::try_from(
        b"POST /login?from=query HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 29\r\n\r\naccount=admin&password=123456",
        0,
    )
    .unwrap();
    c.bench_function("parse_form_urlencoded", |b| {
        b.iter(|| {
            let mut values = Values::new();
            parse_form(black_box(&urlencoded), 1 << 20, &mut values).unwrap();
        });
    });

    let body = "--B\r\nContent-Disposition: form-data; name=\"account\"\r\n\r\nadmin\r\n\
                --B\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"a.png\"\r\n\
                Content-Type: image/png\r\n\r\n0123456789abcdef\r\n--B--\r\n";
    let raw = format!(
        "POST /upload HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=B\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let multipart = Request::try_from(raw.as_bytes(), 0).unwrap();
    c.bench_function("parse_multipart", |b| {
        b.iter(|| {
            let mut form = MultipartForm::default();
            parse_multipart(black_box(&multipart), 1 << 20, &mut form).unwrap();
        });
    });
}

criterion_group!(benches, request_parse_benchmark, form_parse_benchmark);
criterion_main!(benches);
