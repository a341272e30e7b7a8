#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use warden_rs::Enforcer;

const MODEL: &str = "
[request_definition]
r = sub, obj, act
[policy_definition]
p = sub, obj, act
[role_definition]
g = _, _
[policy_effect]
e = some(where (p.eft == allow))
[matchers]
m = g(r.sub, p.sub) && keyMatch2(r.obj, p.obj) && r.act == p.act
";

#[derive(Debug, Arbitrary)]
struct Input {
    matcher: String,
    sub: String,
    obj: String,
    act: String,
}

// Ad hoc matchers and request values must never panic
fuzz_target!(|input: Input| {
    let Ok(e) = Enforcer::from_text(MODEL, "p, admin, /data/:id, read\ng, alice, admin") else {
        return;
    };
    let request = [input.sub.as_str(), input.obj.as_str(), input.act.as_str()];
    let _ = e.enforce_with_matcher(&input.matcher, request);
    let _ = e.enforce(request);
});
