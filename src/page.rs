//! The single-page UI served at `/`: starts a session and polls `/status`
//! once per second until the QR code or readiness shows up.

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>WhatsApp Web Authentication</title>
    <style>
      body { font-family: sans-serif; margin: 2rem; }
      #qr-container img { width: 264px; height: 264px; image-rendering: pixelated; }
      .error { color: #b00020; }
    </style>
  </head>
  <body>
    <h1>WhatsApp Web Authentication</h1>
    <div id="status"></div>
    <div id="qr-container"></div>
    <button id="init-button" onclick="initializeWhatsApp()">Start WhatsApp</button>
    <button id="close-button" onclick="closeWhatsApp()">Close session</button>
    <script>
      let pollTimer = null;

      // Server-provided text goes through textContent only.
      function setStatus(text, className) {
        const heading = document.createElement('h2');
        heading.textContent = text;
        if (className) {
          heading.className = className;
        }
        document.getElementById('status').replaceChildren(heading);
      }

      function initializeWhatsApp() {
        fetch('/initialize')
          .then(response => response.json())
          .then(data => {
            setStatus(data.message);
            checkStatus();
          });
      }

      function closeWhatsApp() {
        clearTimeout(pollTimer);
        fetch('/close')
          .then(response => response.json())
          .then(data => {
            setStatus(data.message);
            document.getElementById('qr-container').innerHTML = '';
            document.getElementById('init-button').style.display = '';
          });
      }

      function checkStatus() {
        fetch('/status')
          .then(response => response.json())
          .then(data => {
            const qr = document.getElementById('qr-container');
            if (data.ready) {
              setStatus('WhatsApp is ready to send and receive messages');
              qr.innerHTML = '';
              document.getElementById('init-button').style.display = 'none';
              return;
            }
            if (data.state === 'error') {
              setStatus('WhatsApp session failed: ' + (data.error || 'unknown error'), 'error');
              qr.innerHTML = '';
              return;
            }
            if (data.state === 'idle' || data.state === 'closed') {
              setStatus(data.state === 'closed' ? 'Session closed' : 'No active session');
              qr.innerHTML = '';
              return;
            }
            if (data.qrCode === 'timeout') {
              setStatus('Still waiting for WhatsApp to produce a QR code...');
            } else if (data.qrCode) {
              setStatus('Scan the QR code with WhatsApp to sign in');
              const img = document.createElement('img');
              img.src = data.qrCode;
              img.alt = 'QR Code';
              qr.replaceChildren(img);
            } else {
              setStatus('Initializing WhatsApp client...');
            }
            pollTimer = setTimeout(checkStatus, 1000);
          });
      }

      checkStatus();
    </script>
  </body>
</html>
"#;
