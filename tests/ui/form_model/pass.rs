use form_schema::form::{FieldValue, FormModel, FormValues};

#[derive(Clone, form_schema::form::FormModel)]
struct DemoForm {
    email: String,
    remember: bool,
}

fn main() {
    let fields = DemoForm::fields();
    let mut model = DemoForm {
        email: "a@example.com".to_string(),
        remember: false,
    };
    model
        .set_field(&fields.email(), FieldValue::from("b@example.com"))
        .expect("email accepts text");
    model
        .set_field(&fields.remember(), FieldValue::from(true))
        .expect("remember accepts a flag");
    assert_eq!(fields.email().as_str(), "email");
    assert_eq!(
        model.field(&fields.email()),
        Some(FieldValue::from("b@example.com"))
    );
    assert!(model.remember);
    assert!(model.set_field(&fields.remember(), FieldValue::from("yes")).is_err());
}
