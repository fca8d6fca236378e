//! Built-in web application bundle.
//!
//! The page, client script, service worker and styles are generated as
//! strings so the server works without an asset directory.

/// Returns the application page.
pub fn index_html() -> &'static str {
    r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="theme-color" content="#1a1a2e">
<link rel="manifest" href="/manifest.json">
<link rel="icon" href="/images/icon.svg" type="image/svg+xml">
<link rel="stylesheet" href="/styles/index.css">
<title>Push Codelab</title>
</head>
<body>
<header>
  <h1>Push Codelab</h1>
</header>
<main>
  <p>Subscribe this browser to push messages from the demo application server.</p>
  <button disabled class="js-push-btn">Enable Push Messaging</button>
  <section class="subscription-details js-subscription-details is-invisible">
    <p>Send this subscription to your application server to push messages to this browser:</p>
    <pre><code class="js-subscription-json"></code></pre>
  </section>
</main>
<script src="/scripts/main.js"></script>
</body>
</html>
"##
}

/// Returns the client script with the application server key embedded.
///
/// `key_literal` must already be a quoted JavaScript string literal.
pub fn main_js(key_literal: &str) -> String {
    format!(
        r##"'use strict';

(function() {{
  const applicationServerPublicKey = {key_literal};

  const pushButton = document.querySelector('.js-push-btn');
  const subscriptionJson = document.querySelector('.js-subscription-json');
  const subscriptionDetails = document.querySelector('.js-subscription-details');

  let isSubscribed = false;
  let inFlight = false;
  let registration = null;

  function decodeApplicationKey(key) {{
    const padding = '='.repeat((4 - key.length % 4) % 4);
    const base64 = (key + padding).replace(/-/g, '+').replace(/_/g, '/');
    const raw = window.atob(base64);
    const bytes = new Uint8Array(raw.length);
    for (let i = 0; i < raw.length; ++i) {{
      bytes[i] = raw.charCodeAt(i);
    }}
    return bytes;
  }}

  function publishSubscription(subscription) {{
    if (subscription) {{
      subscriptionJson.textContent = JSON.stringify(subscription);
      subscriptionDetails.classList.remove('is-invisible');
    }} else {{
      subscriptionDetails.classList.add('is-invisible');
    }}
  }}

  function refreshButtonState() {{
    if (Notification.permission === 'denied') {{
      pushButton.textContent = 'Push Messaging Blocked.';
      pushButton.disabled = true;
      publishSubscription(null);
      return;
    }}
    pushButton.textContent = isSubscribed ? 'Disable Push Messaging' : 'Enable Push Messaging';
    pushButton.disabled = false;
  }}

  async function subscribe() {{
    let key;
    try {{
      key = decodeApplicationKey(applicationServerPublicKey);
    }} catch (err) {{
      console.error('Invalid application server key:', err);
      refreshButtonState();
      return;
    }}
    try {{
      const subscription = await registration.pushManager.subscribe({{
        userVisibleOnly: true,
        applicationServerKey: key
      }});
      console.log('User is subscribed.');
      publishSubscription(subscription);
      isSubscribed = true;
    }} catch (err) {{
      console.error('Failed to subscribe the user:', err);
    }}
    refreshButtonState();
  }}

  async function unsubscribe() {{
    try {{
      const subscription = await registration.pushManager.getSubscription();
      if (subscription) {{
        await subscription.unsubscribe();
      }}
      console.log('User is unsubscribed.');
      publishSubscription(null);
      isSubscribed = false;
    }} catch (err) {{
      console.error('Failed to unsubscribe the user:', err);
    }}
    refreshButtonState();
  }}

  async function onButtonActivated() {{
    pushButton.disabled = true;
    if (inFlight) {{
      return;
    }}
    inFlight = true;
    try {{
      if (isSubscribed) {{
        await unsubscribe();
      }} else {{
        await subscribe();
      }}
    }} finally {{
      inFlight = false;
    }}
  }}

  async function initialize(swRegistration) {{
    registration = swRegistration;
    pushButton.addEventListener('click', onButtonActivated);
    const subscription = await registration.pushManager.getSubscription();
    isSubscribed = subscription !== null;
    console.log(isSubscribed ? 'User IS subscribed' : 'User is NOT subscribed');
    refreshButtonState();
  }}

  if (!('serviceWorker' in navigator) || !('PushManager' in window)) {{
    console.warn('Push messaging is not supported');
    pushButton.textContent = 'Push Not Supported';
    pushButton.disabled = true;
    return;
  }}

  navigator.serviceWorker.register('/sw.js')
    .then(function(swRegistration) {{
      console.log('Service worker is registered', swRegistration);
      return initialize(swRegistration);
    }})
    .catch(function(err) {{
      console.error('Service worker registration failed:', err);
      pushButton.textContent = 'Push Unavailable';
      pushButton.disabled = true;
    }});
}})();
"##
    )
}

/// Returns the service worker that displays incoming push messages.
pub fn service_worker_js() -> &'static str {
    r##"'use strict';

self.addEventListener('push', function(event) {
  const text = event.data ? event.data.text() : 'Push message received';
  console.log('[Service Worker] Push received:', text);

  event.waitUntil(self.registration.showNotification('Push Codelab', {
    body: text,
    icon: '/images/icon.svg',
    badge: '/images/icon.svg'
  }));
});

self.addEventListener('notificationclick', function(event) {
  event.notification.close();
  event.waitUntil(
    clients.matchAll({ type: 'window' }).then(function(windows) {
      for (const client of windows) {
        if ('focus' in client) {
          return client.focus();
        }
      }
      return clients.openWindow('/');
    })
  );
});
"##
}

/// Returns the page stylesheet.
pub fn styles_css() -> &'static str {
    r##"body {
  font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', system-ui, sans-serif;
  background: #1a1a2e;
  color: #e0e0e0;
  margin: 0;
}
header {
  background: #16213e;
  padding: 12px 16px;
  border-bottom: 1px solid #0f3460;
}
header h1 {
  font-size: 1.1rem;
  color: #00bcd4;
  margin: 0;
}
main {
  max-width: 720px;
  margin: 0 auto;
  padding: 16px;
}
.js-push-btn {
  background: #e94560;
  color: #fff;
  border: none;
  border-radius: 8px;
  padding: 12px 20px;
  font-size: 0.9rem;
  font-weight: 600;
  cursor: pointer;
}
.js-push-btn:disabled {
  background: #0f3460;
  color: #a0a0b0;
  cursor: default;
}
.subscription-details pre {
  background: #16213e;
  padding: 12px;
  border-radius: 8px;
  white-space: pre-wrap;
  word-break: break-all;
}
.is-invisible {
  display: none;
}
"##
}

/// Returns the PWA manifest JSON.
pub fn manifest_json() -> &'static str {
    r##"{
  "name": "Push Codelab",
  "short_name": "Push Codelab",
  "start_url": "/",
  "display": "standalone",
  "background_color": "#1a1a2e",
  "theme_color": "#1a1a2e",
  "icons": [
    {
      "src": "/images/icon.svg",
      "sizes": "192x192",
      "type": "image/svg+xml"
    }
  ]
}
"##
}

/// Returns the notification and page icon.
pub fn icon_svg() -> &'static str {
    r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 192 192">
  <rect width="192" height="192" rx="32" fill="#1a1a2e"/>
  <path d="M96,40 C70,40 56,60 56,84 L56,116 L44,132 L148,132 L136,116 L136,84 C136,60 122,40 96,40 Z" fill="none" stroke="#00bcd4" stroke-width="8" stroke-linejoin="round"/>
  <circle cx="96" cy="148" r="10" fill="#e94560"/>
</svg>"##
}
