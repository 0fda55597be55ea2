/*!

This is the long-form manual for `forecast_engine` and the `forecast` command.

## Daily run

A run reads the poll feed, fits the hierarchical model, and writes four tables:
* `state_probabilities.csv` the win probability of the tracked candidate in every state
* `simulation_data.csv` one row per simulated election: the winner and the electoral votes of the tracked candidate
* `tracking_data.csv` the national time series, one row per day and candidate
* `priors.csv` the posterior summary, read back as the prior of the next run

Running twice on the same day replaces that day's tracking rows.

## Input formats

### Poll feed

CSV with a header row. The columns used are:
`question_id, candidate_id, state, methodology, population, sample_size, end_date, numeric_grade, partisan, pct`.
Other columns are ignored and empty cells are missing values. Dates are accepted as `9/15/24`, `9/15/2024`
or `2024-09-15`.

A question is a group of rows sharing a `question_id`, one per candidate. Only the questions offering both
candidates of the race are kept. Questions offering more candidates are flagged by default
(the `multiCandidate` covariate), or stop the run with `"multiCandidate": "reject"`.

### Prior table

`var, mean, sd, state`. The `state` column is only filled for the `a_offset[i]` rows: offsets are matched
by state name, since the state ids change from one day to the next. Standard deviations at or under 0 are
replaced by 0.01.

### Electoral table

`state, electors`. Optional: the 2024 apportionment is built in. Maine and Nebraska districts are
pseudo-states named `ME-1`, `NE-2`, etc.

### Historical baseline

`state, pct_estimate`: the share of the tracked candidate at the previous election, in percent. States
without polls are given a probability of 0.99 when this share is above 50, and 0.01 otherwise.

## Model

```text
intercept[s] = mu_b0 + a_offset[s] * sigma_b0
eta_i        = intercept[state_i] + sum_k coefficient_k * x_ik
```

With the `gaussian` family, the two-way share is normal around `eta` with scale `error`. With the `beta`
family (the default), the share is `Beta(mu * phi, (1 - mu) * phi)` with `mu = logistic(eta)`.

The covariates are: methodology (live phone, online panel, app panel, other; probability panels are the
reference), month since the first poll, partisan sponsor, sample size, multi-candidate question, likely
voters, registered voters and pollster grade.

## Configuration

The `prior_sd_scale` setting multiplies every standard deviation of the previous posterior before it is
used as a prior. A value of 1 is plain sequential updating; larger values forget faster.
*/
