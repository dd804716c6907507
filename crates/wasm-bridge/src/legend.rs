//! d3 colour-bar scene

use charts::color_bar::{BandJoin, LegendFrame, PlacedBand};
use charts::LegendRenderer;
use shared_types::AnnotateResult;
use wasm_bindgen::prelude::*;
use web_sys::{Element, HtmlElement};

#[wasm_bindgen]
extern "C" {
    type Selection;

    #[wasm_bindgen(js_namespace = d3, js_name = select)]
    fn select(node: &Element) -> Selection;

    #[wasm_bindgen(method, js_name = select)]
    fn select_child(this: &Selection, selector: &str) -> Selection;

    #[wasm_bindgen(method, js_name = selectAll)]
    fn select_all(this: &Selection, selector: &str) -> Selection;

    #[wasm_bindgen(method)]
    fn append(this: &Selection, name: &str) -> Selection;

    #[wasm_bindgen(method)]
    fn attr(this: &Selection, name: &str, value: &JsValue) -> Selection;

    #[wasm_bindgen(method)]
    fn style(this: &Selection, name: &str, value: &str) -> Selection;

    #[wasm_bindgen(method)]
    fn text(this: &Selection, value: &str) -> Selection;

    #[wasm_bindgen(method)]
    fn remove(this: &Selection) -> Selection;
}

const SCENE_CLASS: &str = "plot-annotator-colorbar";

fn num(value: f64) -> JsValue {
    JsValue::from_f64(value)
}

fn s(value: &str) -> JsValue {
    JsValue::from_str(value)
}

/// Renders the legend as an SVG pinned to the right edge of the host
pub struct D3Legend {
    host: HtmlElement,
    svg: Option<Selection>,
}

impl D3Legend {
    pub fn new(host: HtmlElement) -> Self {
        Self { host, svg: None }
    }

    fn group(&self) -> Option<Selection> {
        self.svg.as_ref().map(|svg| svg.select_child("g.bands"))
    }

    fn place_svg(svg: &Selection, frame: &LegendFrame) {
        svg.attr("width", &num(frame.width))
            .attr(
                "height",
                &num(frame.height + frame.top_margin + frame.bottom_margin),
            )
            .style("position", "absolute")
            .style("top", "0px")
            .style("right", &format!("{}px", frame.right_margin));
        svg.select_child("g.bands")
            .attr("transform", &s(&format!("translate(0,{})", frame.top_margin)));
    }

    fn draw_band(group: &Selection, frame: &LegendFrame, band: &PlacedBand) {
        let cell = group
            .append("g")
            .attr("class", &s("band"))
            .attr("data-index", &num(band.index as f64));
        cell.append("rect");
        cell.append("text");
        Self::update_band(group, frame, band);
    }

    fn update_band(group: &Selection, frame: &LegendFrame, band: &PlacedBand) {
        let cell = group.select_child(&format!("g.band[data-index='{}']", band.index));
        cell.select_child("rect")
            .attr("x", &num(0.0))
            .attr("y", &num(band.y))
            .attr("width", &num(frame.bar_width))
            .attr("height", &num(band.height))
            .attr("fill", &s(&band.color));
        cell.select_child("text")
            .attr("x", &num(band.label_x))
            .attr("y", &num(band.label_y))
            .attr("dominant-baseline", &s("middle"))
            .attr("fill", &s(&frame.label_color))
            .attr("font-size", &num(frame.label_size))
            .attr("font-family", &s(&frame.font_family))
            .style(
                "display",
                if frame.show_labels { "inline" } else { "none" },
            )
            .text(&band.label);
    }
}

impl LegendRenderer for D3Legend {
    fn host_height(&self) -> Option<f64> {
        if self.host.offset_parent().is_none() {
            return None;
        }
        let height = f64::from(self.host.client_height());
        (height > 0.0).then_some(height)
    }

    fn create_scene(&mut self, frame: &LegendFrame, bands: &[PlacedBand]) -> AnnotateResult<()> {
        self.remove_scene()?;
        let svg = select(&self.host)
            .append("svg")
            .attr("class", &s(SCENE_CLASS));
        svg.append("g").attr("class", &s("bands"));
        Self::place_svg(&svg, frame);
        let group = svg.select_child("g.bands");
        for band in bands {
            Self::draw_band(&group, frame, band);
        }
        self.svg = Some(svg);
        Ok(())
    }

    fn apply_join(&mut self, join: &BandJoin) -> AnnotateResult<()> {
        let Some(group) = self.group() else {
            return self.create_scene(&join.frame, &join.update);
        };
        if let Some(svg) = &self.svg {
            Self::place_svg(svg, &join.frame);
        }
        for index in &join.exit {
            group
                .select_all(&format!("g.band[data-index='{index}']"))
                .remove();
        }
        for band in &join.update {
            Self::update_band(&group, &join.frame, band);
        }
        for band in &join.enter {
            Self::draw_band(&group, &join.frame, band);
        }
        Ok(())
    }

    fn remove_scene(&mut self) -> AnnotateResult<()> {
        if let Some(svg) = self.svg.take() {
            svg.remove();
        }
        select(&self.host)
            .select_all(&format!("svg.{SCENE_CLASS}"))
            .remove();
        Ok(())
    }
}
