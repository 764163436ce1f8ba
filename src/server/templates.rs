//! HTML template for the dashboard page. Figures render client-side with
//! Plotly; the page only carries the brand selector and three panels.

const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Vinted Dashboard</title>
    <script src="https://cdn.plot.ly/plotly-2.32.0.min.js"></script>
    <style>
        body { font-family: sans-serif; margin: 0; background: #f2f4f5; color: #263238; }
        header { padding: 12px 24px; background: #008080; color: white; }
        header h1 { margin: 0; font-size: 22px; }
        main { max-width: 960px; margin: 16px auto; padding: 0 16px; }
        .panel { background: white; border-radius: 6px; padding: 12px 16px; margin-bottom: 16px;
                 box-shadow: 0 1px 2px rgba(0,0,0,0.15); }
        .panel h4 { margin: 0 0 8px 0; }
        .indicators { display: flex; gap: 16px; }
        .indicators .panel { flex: 1; }
        select { font-size: 15px; padding: 4px; min-width: 220px; }
        footer { max-width: 960px; margin: 0 auto 24px auto; padding: 0 16px; color: #607d8b;
                 font-size: 13px; }
    </style>
</head>
<body>
    <header><h1>Vinted Dashboard</h1></header>
    <main>
        <div class="panel">
            <h4>Parameters</h4>
            <label for="brand-selector">Select a brand: </label>
            <select id="brand-selector"><!--BRAND_OPTIONS--></select>
        </div>
        <div class="indicators">
            <div class="panel">
                <h4>Available Scraped Ads</h4>
                <div id="scraped-ads-indicator"></div>
            </div>
            <div class="panel">
                <h4>Trends Last 30 Days</h4>
                <div id="ads-trend-indicator"></div>
            </div>
        </div>
        <div class="panel">
            <h4>Price Distribution</h4>
            <div id="price-distrib-graph"></div>
        </div>
    </main>
    <footer>Listings are scraped periodically; figures recompute per selected brand.</footer>
    <script>
        const selector = document.getElementById('brand-selector');

        async function refresh() {
            const brand = selector.value;
            const response = await fetch('/api/summary?brand=' + encodeURIComponent(brand));
            const summary = await response.json();

            Plotly.react('scraped-ads-indicator', [{
                type: 'indicator',
                mode: 'number',
                value: summary.scraped_count,
                number: { font: { color: '#263238', size: 50 } },
                title: { text: 'Total ads count' }
            }], { height: 180, margin: { l: 10, r: 10, t: 10, b: 10 } },
               { displayModeBar: false });

            Plotly.react('ads-trend-indicator', [{
                type: 'indicator',
                mode: 'number+delta',
                value: summary.trend_current,
                delta: { reference: summary.trend_previous },
                number: { font: { color: '#263238', size: 50 } },
                title: { text: 'Ads posted in the last ' + summary.trend_window_days + ' days' }
            }], { height: 180, margin: { l: 10, r: 10, t: 10, b: 10 } },
               { displayModeBar: false });

            Plotly.react('price-distrib-graph', [{
                type: 'histogram',
                x: summary.prices,
                marker: { color: '#008080' }
            }], {
                height: 320,
                margin: { l: 50, r: 10, t: 10, b: 40 },
                xaxis: { title: 'Selling price (€)' },
                yaxis: { title: 'Ads' },
                showlegend: false
            }, { displayModeBar: false });
        }

        selector.addEventListener('change', refresh);
        if (selector.options.length > 0) { refresh(); }
    </script>
</body>
</html>
"#;

/// Render the dashboard page with the brand selector populated.
pub fn dashboard_page(brands: &[String]) -> String {
    let options: String = brands
        .iter()
        .map(|brand| {
            let escaped = html_escape(brand);
            format!(r#"<option value="{escaped}">{escaped}</option>"#)
        })
        .collect();
    PAGE.replace("<!--BRAND_OPTIONS-->", &options)
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_lists_every_brand() {
        let page = dashboard_page(&["Nike".to_string(), "Levi's".to_string()]);
        assert!(page.contains(r#"<option value="Nike">Nike</option>"#));
        assert!(page.contains("Levi's"));
    }

    #[test]
    fn brand_names_are_escaped() {
        let page = dashboard_page(&["H&M".to_string()]);
        assert!(page.contains("H&amp;M"));
        assert!(!page.contains(r#"value="H&M""#));
    }
}
