/// HTML body for the digest email, rendered with minijinja.
pub const DAILY_DIGEST_EMAIL_TEMPLATE: &str = r#"
<!DOCTYPE html>
<html>
  <body style="font-family: Arial, Helvetica, sans-serif; color: #222; max-width: 640px; margin: 0 auto;">
    <h2>Your email digest for {{ digest_date }}</h2>
    <p>{{ email_count }} emails were summarized.</p>
    {% if categories %}
    <h3>Topics</h3>
    <ul>
      {% for category in categories %}
      <li>{{ category.description }}</li>
      {% endfor %}
    </ul>
    {% endif %}
    <h3>Summary</h3>
    {% for line in content_lines %}
    <p>{{ line }}</p>
    {% endfor %}
  </body>
</html>
"#;
